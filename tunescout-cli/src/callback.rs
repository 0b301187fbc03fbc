//! Interactive Spotify authorization through a local callback listener.

use axum::{extract::Query, response::Html, routing::get, Router};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tunescout_spotify_api::{CredentialManager, SpotifyError};

/// Timeout for interactive OAuth callback (10 minutes)
const OAUTH_CALLBACK_TIMEOUT_SECS: u64 = 600;

type CallbackSender = Arc<Mutex<Option<oneshot::Sender<Result<String, String>>>>>;

/// Query parameters for the OAuth callback
#[derive(Debug, Default, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Run the full authorization flow: open the consent page, wait for the
/// redirect and exchange the code.
///
/// # Errors
///
/// Returns [`SpotifyError::Auth`] if the listener cannot start, the user
/// denies access, the wait times out, or the exchange fails. Callbacks with
/// a foreign `state` are ignored.
pub async fn authorize_interactive(
    credentials: &CredentialManager,
    cancel_token: &CancellationToken,
) -> Result<(), SpotifyError> {
    let request = credentials.authorization_url()?;
    let (host, port, callback_path) = parse_redirect_uri(&credentials.config().redirect_uri)?;

    let (tx, rx) = oneshot::channel();
    let tx: CallbackSender = Arc::new(Mutex::new(Some(tx)));

    let app = build_callback_router(&callback_path, request.state, tx);
    let (listener, addr) = start_callback_server(&host, port, &callback_path).await?;

    prompt_authorization(&request.url, addr, &callback_path);

    let code = wait_for_callback(rx, listener, app, cancel_token).await?;

    info!("Received authorization code, exchanging for token...");
    credentials.exchange_authorization_code(&code).await?;
    info!("Successfully authenticated with Spotify");
    Ok(())
}

fn auth_error(reason: impl Into<String>) -> SpotifyError {
    SpotifyError::Auth {
        reason: reason.into(),
    }
}

/// Parse redirect URI components for OAuth callback server
fn parse_redirect_uri(redirect_uri: &str) -> Result<(String, u16, String), SpotifyError> {
    let parsed_uri = url::Url::parse(redirect_uri)
        .map_err(|e| auth_error(format!("Invalid redirect URI: {e}")))?;

    let host = parsed_uri.host_str().unwrap_or("localhost").to_string();
    let port = parsed_uri.port().unwrap_or(8888);
    let callback_path = parsed_uri.path().to_string();

    Ok((host, port, callback_path))
}

/// Decide what a callback request means for the pending authorization.
///
/// `None` means the request carries no or a foreign `state`; it does not
/// belong to this authorization and must not end the wait.
fn check_callback(params: CallbackParams, expected_state: &str) -> Option<Result<String, String>> {
    if params.state.as_deref() != Some(expected_state) {
        return None;
    }
    if let Some(error) = params.error {
        return Some(Err(format!("Authorization denied: {error}")));
    }
    Some(
        params
            .code
            .filter(|code| !code.is_empty())
            .ok_or_else(|| "No authorization code received".into()),
    )
}

/// Build the OAuth callback router
fn build_callback_router(callback_path: &str, expected_state: String, tx: CallbackSender) -> Router {
    let expected_state = Arc::new(expected_state);
    Router::new().route(
        callback_path,
        get(move |Query(params): Query<CallbackParams>| {
            let tx = tx.clone();
            let expected_state = expected_state.clone();
            async move {
                let Some(outcome) = check_callback(params, &expected_state) else {
                    warn!("Ignoring authorization callback with mismatched state");
                    return Html(failure_html("State mismatch in authorization callback"));
                };
                let page = match outcome {
                    Ok(_) => Html(SUCCESS_HTML.to_string()),
                    Err(ref reason) => Html(failure_html(reason)),
                };
                if let Some(sender) = tx.lock().await.take() {
                    let _ = sender.send(outcome);
                }
                page
            }
        }),
    )
}

/// Start the callback server and bind to address
async fn start_callback_server(
    host: &str,
    port: u16,
    callback_path: &str,
) -> Result<(tokio::net::TcpListener, SocketAddr), SpotifyError> {
    let host = if host == "localhost" { "127.0.0.1" } else { host };
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| auth_error(format!("Invalid address: {e}")))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| auth_error(format!("Failed to bind to {addr}: {e}")))?;

    info!(
        "OAuth callback server listening on http://{}{}",
        addr, callback_path
    );
    Ok((listener, addr))
}

/// Display authorization prompt and open browser
fn prompt_authorization(auth_url: &str, addr: SocketAddr, callback_path: &str) {
    info!("Opening browser for Spotify authorization...");

    if let Err(e) = open::that(auth_url) {
        warn!("Could not open browser automatically: {}", e);
        info!("Please open this URL manually:\n{auth_url}");
    }

    info!(
        "Waiting for authorization callback on http://{}{callback_path}...",
        addr
    );
}

/// Wait for OAuth callback with timeout
async fn wait_for_callback(
    rx: oneshot::Receiver<Result<String, String>>,
    listener: tokio::net::TcpListener,
    app: Router,
    cancel_token: &CancellationToken,
) -> Result<String, SpotifyError> {
    let server = axum::serve(listener, app);

    tokio::select! {
        result = rx => {
            result
                .map_err(|_| auth_error("Callback channel closed unexpectedly"))?
                .map_err(auth_error)
        }
        _ = server => {
            Err(auth_error("Server stopped unexpectedly"))
        }
        () = cancel_token.cancelled() => {
            Err(auth_error("Authorization cancelled"))
        }
        () = tokio::time::sleep(Duration::from_secs(OAUTH_CALLBACK_TIMEOUT_SECS)) => {
            Err(auth_error(format!(
                "OAuth callback timed out after {} minutes. Please try again.",
                OAUTH_CALLBACK_TIMEOUT_SECS / 60
            )))
        }
    }
}

fn failure_html(reason: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Authorization Failed</title></head>
<body style="font-family: sans-serif; text-align: center; padding: 50px;">
    <h1>Authorization Failed</h1>
    <p>{reason}</p>
    <p>Please close this window and run <code>tunescout login</code> again.</p>
</body>
</html>"#
    )
}

/// HTML response shown on successful authorization
const SUCCESS_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authorization Successful</title></head>
<body style="font-family: sans-serif; text-align: center; padding: 50px;">
    <h1>Signed in to Tunescout</h1>
    <p>You can close this window and return to the terminal.</p>
</body>
</html>"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn params(code: Option<&str>, state: Option<&str>, error: Option<&str>) -> CallbackParams {
        CallbackParams {
            code: code.map(String::from),
            state: state.map(String::from),
            error: error.map(String::from),
        }
    }

    #[test]
    fn test_parse_redirect_uri() {
        let (host, port, path) = parse_redirect_uri("http://127.0.0.1:8888/callback").unwrap();
        assert_eq!(host, "127.0.0.1");
        assert_eq!(port, 8888);
        assert_eq!(path, "/callback");

        let (host, port, path) = parse_redirect_uri("http://localhost/auth/done").unwrap();
        assert_eq!(host, "localhost");
        assert_eq!(port, 8888);
        assert_eq!(path, "/auth/done");

        assert!(parse_redirect_uri("not a uri").is_err());
    }

    #[test]
    fn test_callback_with_matching_state() {
        let outcome = check_callback(params(Some("abc"), Some("s1"), None), "s1");
        assert_eq!(outcome, Some(Ok("abc".to_string())));
    }

    #[test]
    fn test_callback_state_mismatch_is_ignored() {
        assert_eq!(
            check_callback(params(Some("abc"), Some("forged"), None), "s1"),
            None
        );
        assert_eq!(check_callback(params(Some("abc"), None, None), "s1"), None);
        assert_eq!(
            check_callback(params(None, Some("forged"), Some("access_denied")), "s1"),
            None
        );
    }

    #[test]
    fn test_callback_denied() {
        let outcome = check_callback(params(None, Some("s1"), Some("access_denied")), "s1");
        assert_eq!(
            outcome,
            Some(Err("Authorization denied: access_denied".to_string()))
        );
    }

    #[test]
    fn test_callback_without_code() {
        assert!(matches!(
            check_callback(params(None, Some("s1"), None), "s1"),
            Some(Err(_))
        ));
        assert!(matches!(
            check_callback(params(Some(""), Some("s1"), None), "s1"),
            Some(Err(_))
        ));
    }

    #[tokio::test]
    async fn test_forged_callback_does_not_end_the_wait() {
        let (tx, rx) = oneshot::channel();
        let tx: CallbackSender = Arc::new(Mutex::new(Some(tx)));
        let app = build_callback_router("/callback", "s1".to_string(), tx);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/callback", listener.local_addr().unwrap());

        let requests = tokio::spawn(async move {
            let client = reqwest::Client::new();
            let forged = client
                .get(format!("{base}?code=evil&state=forged"))
                .send()
                .await
                .unwrap();
            assert!(forged.text().await.unwrap().contains("State mismatch"));
            // The listener shuts down once the code arrives
            let _ = client
                .get(format!("{base}?code=good&state=s1"))
                .send()
                .await;
        });

        let code = wait_for_callback(rx, listener, app, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(code, "good");
        requests.await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_callback_honors_cancellation() {
        let (_tx, rx) = oneshot::channel();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let cancel_token = CancellationToken::new();
        cancel_token.cancel();

        let result = wait_for_callback(rx, listener, Router::new(), &cancel_token).await;
        assert!(matches!(result, Err(SpotifyError::Auth { .. })));
    }
}
