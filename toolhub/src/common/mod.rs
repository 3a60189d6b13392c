//! 共通型定義

/// 認証関連のデータモデル
pub mod auth;

/// ツールカタログのドメイン型
pub mod catalog;

/// エラー型
pub mod error;

/// ページング
pub mod pagination;
