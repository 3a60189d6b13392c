// 認証ミドルウェア実装

use crate::api::error::AppError;
use crate::common::auth::{Claims, User, UserRole};
use crate::common::error::HubError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Authorizationヘッダーから`Bearer`トークンを取り出す
fn bearer_token(headers: &HeaderMap) -> Result<&str, HubError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| HubError::Authentication("Not authenticated".to_string()))?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            HubError::Authentication("Invalid Authorization header format".to_string())
        })
}

/// トークンの種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    /// 通常のアクセストークン
    Full,
    /// 2FAコード検証待ちの仮トークン
    Pending,
}

fn check_kind(claims: &Claims, expected: TokenKind) -> Result<(), HubError> {
    match (expected, claims.two_factor_pending) {
        (TokenKind::Full, true) => Err(HubError::Authentication(
            "2FA verification required".to_string(),
        )),
        (TokenKind::Pending, false) => Err(HubError::Authentication(
            "Token is not awaiting 2FA verification".to_string(),
        )),
        _ => Ok(()),
    }
}

/// トークンを検証し、対応するユーザーをDBから読み込む
///
/// ロールはトークンではなくDBの値を使う（ロール変更・削除を即時反映する）。
async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    kind: TokenKind,
) -> Result<User, HubError> {
    let token = bearer_token(headers)?;
    let claims = crate::auth::jwt::verify_jwt(token, &state.jwt_secret)?;
    check_kind(&claims, kind)?;

    let user_id = claims
        .user_id()
        .ok_or_else(|| HubError::Jwt(format!("Malformed subject '{}'", claims.sub)))?;

    crate::db::users::find_by_id(&state.db_pool, user_id)
        .await?
        .ok_or_else(|| HubError::Authentication("Could not validate credentials".to_string()))
}

fn reject(err: HubError) -> Response {
    if err.is_server_error() {
        tracing::error!("Authentication lookup failed: {}", err);
    } else {
        tracing::debug!("Authentication rejected: {}", err);
    }
    AppError(err).into_response()
}

/// JWT認証ミドルウェア
///
/// Authorizationヘッダーから "Bearer {token}" を抽出してJWT検証を行う。
/// 2FA仮トークンはここでは受け付けない。
///
/// # Returns
/// * `Ok(Response)` - 認証成功、requestに`User`を追加
/// * `Err(Response)` - 認証失敗、401 Unauthorized
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let user = authenticate(&state, request.headers(), TokenKind::Full)
        .await
        .map_err(reject)?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// 2FA仮トークン専用の認証ミドルウェア（`/api/auth/verify-2fa`用）
pub async fn pending_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let user = authenticate(&state, request.headers(), TokenKind::Pending)
        .await
        .map_err(reject)?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// ロール要求ミドルウェア
///
/// `jwt_auth_middleware`の内側に置く。ロールが`required`未満なら403。
pub async fn require_role_middleware(
    State(required): State<UserRole>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    let user = request.extensions().get::<User>().ok_or_else(|| {
        reject(HubError::Authentication("Not authenticated".to_string()))
    })?;

    require_role(user, required).map_err(reject)?;
    Ok(next.run(request).await)
}

/// ユーザーのロールが`required`以上であることを確認
pub fn require_role(user: &User, required: UserRole) -> Result<(), HubError> {
    if user.role.has_at_least(required) {
        Ok(())
    } else {
        tracing::warn!(
            user_id = user.id,
            role = %user.role,
            required = %required,
            "Insufficient role"
        );
        Err(HubError::Authorization(format!(
            "{} access required",
            capitalize(required.as_str())
        )))
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// 公開エンドポイント向け：有効な通常トークンがあればユーザーを返す
///
/// トークンが無い・無効な場合は匿名扱い（None）。
pub async fn optional_user(state: &AppState, headers: &HeaderMap) -> Option<User> {
    if !headers.contains_key(header::AUTHORIZATION) {
        return None;
    }
    match authenticate(state, headers, TokenKind::Full).await {
        Ok(user) => Some(user),
        Err(e) => {
            tracing::debug!("Ignoring credentials on public endpoint: {}", e);
            None
        }
    }
}
