//! Integration tests for the security handler.
//!
//! Each test starts the real router on an ephemeral loopback port with a
//! temporary document root and security config, then drives it over HTTP.
//! Loopback callers bypass authentication, so most servers here force
//! authentication the way `--debug-security` does.

use anyhow::{Context, Result};
use gatehouse::{
    config::SecurityConfig,
    gatehouse::{self as server, SecurityState},
    security::{
        AuthDecisionEngine, ConfigStore, DigestParams, DigestVerifier, Md5DigestVerifier,
        PasswordVault, PolicyTable,
    },
};
use reqwest::{header::WWW_AUTHENTICATE, StatusCode};
use secrecy::SecretString;
use serde_json::Value;
use std::{fs, net::SocketAddr, path::Path, sync::Arc};
use tempfile::TempDir;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

const REALM: &str = "gatehouse";

const CONFIG: &str = r#"{
    "default_user": "admin",
    "groups": [{ "name": "admins" }],
    "users": [
        { "name": "admin", "group": "admins" },
        { "name": "alice", "password": "right", "group": "admins" },
        { "name": "bob", "password": "builder", "group": "admins" },
        { "name": "eve", "password": "pw" }
    ],
    "access_limits": [
        { "path": "/admin", "method": "digest", "group": "admins" },
        { "path": "/private", "method": "basic" },
        { "path": "/hidden", "method": "none" },
        { "path": "/secure", "method": "full", "secure": true }
    ]
}"#;

struct Settings {
    force_auth: bool,
    trust_forwarded_proto: bool,
    secure: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            force_auth: true,
            trust_forwarded_proto: false,
            secure: true,
        }
    }
}

struct TestServer {
    _web_root: TempDir,
    addr: SocketAddr,
    client: reqwest::Client,
}

impl TestServer {
    async fn start(settings: Settings) -> Result<Self> {
        let web_root = tempfile::tempdir().context("failed to create web root")?;
        write_documents(web_root.path())?;

        let config = SecurityConfig::from_json(CONFIG)?;
        let vault = Arc::new(PasswordVault::with_password("fallback"));
        let engine = AuthDecisionEngine::new(Arc::new(ConfigStore::new(&config, vault)))
            .with_digest(Arc::new(Md5DigestVerifier::new(REALM)))
            .with_forced_auth(settings.force_auth);
        let state = SecurityState::new(
            engine,
            Arc::new(PolicyTable::from_config(&config)),
            REALM.to_string(),
        )
        .with_trusted_forwarded_proto(settings.trust_forwarded_proto);

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = server::router(Arc::new(state), web_root.path(), settings.secure);

        tokio::spawn(async move {
            if let Err(err) = server::serve(listener, app).await {
                eprintln!("test server stopped: {err}");
            }
        });

        Ok(Self {
            _web_root: web_root,
            addr,
            client: reqwest::Client::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path))
    }
}

fn write_documents(root: &Path) -> Result<()> {
    for (path, body) in [
        ("index.html", "welcome"),
        ("admin/index.html", "admin area"),
        ("private/doc.html", "private doc"),
        ("hidden/page.html", "hidden page"),
        ("secure/doc.html", "secure doc"),
    ] {
        let file = root.join(path);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(file, body)?;
    }
    Ok(())
}

fn challenge(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(WWW_AUTHENTICATE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn challenge_nonce(challenge: &str) -> Option<String> {
    let start = challenge.find("nonce=\"")? + "nonce=\"".len();
    let end = challenge[start..].find('"')? + start;
    Some(challenge[start..end].to_string())
}

async fn issued_nonce(server: &TestServer, path: &str) -> Result<String> {
    let response = server.get(path).send().await?;
    challenge_nonce(&challenge(&response)).context("challenge carries no nonce")
}

/// Send `request` verbatim on a fresh connection and return the raw response.
async fn raw_request(addr: SocketAddr, request: &str) -> Result<String> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(request.as_bytes()).await?;
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await?;
    Ok(String::from_utf8_lossy(&response).into_owned())
}

fn digest_header(user: &str, password: &str, nonce: &str, uri: &str, target: &str) -> String {
    let mut params = DigestParams {
        username: user.to_string(),
        realm: REALM.to_string(),
        nonce: nonce.to_string(),
        uri: uri.to_string(),
        qop: Some("auth".to_string()),
        nc: Some("00000001".to_string()),
        cnonce: Some("0a4f113b".to_string()),
        method: "GET".to_string(),
        request_target: target.to_string(),
        ..DigestParams::default()
    };
    params.response = Md5DigestVerifier::new(REALM)
        .compute_digest(&params, &SecretString::from(password.to_string()));

    format!(
        r#"Digest username="{user}", realm="{REALM}", nonce="{nonce}", uri="{uri}", qop=auth, nc=00000001, cnonce="0a4f113b", response="{}""#,
        params.response
    )
}

#[tokio::test]
async fn unrestricted_documents_are_served() -> Result<()> {
    let server = TestServer::start(Settings::default()).await?;

    let response = server.get("/index.html").send().await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.text().await?, "welcome");

    Ok(())
}

#[tokio::test]
async fn hidden_documents_look_missing() -> Result<()> {
    let server = TestServer::start(Settings::default()).await?;

    let response = server
        .get("/hidden/page.html")
        .basic_auth("alice", Some("right"))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.text().await?, "Page Not Found");

    Ok(())
}

#[tokio::test]
async fn basic_auth_flow() -> Result<()> {
    let server = TestServer::start(Settings::default()).await?;

    let anonymous = server.get("/private/doc.html").send().await?;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(challenge(&anonymous), r#"Basic realm="gatehouse""#);
    assert_eq!(
        anonymous.text().await?,
        "Access to this document requires a User ID"
    );

    let unknown = server
        .get("/private/doc.html")
        .basic_auth("mallory", Some("right"))
        .send()
        .await?;
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.text().await?, "Access Denied\nUnknown User");

    let wrong = server
        .get("/private/doc.html")
        .basic_auth("alice", Some("wrong"))
        .send()
        .await?;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.text().await?, "Access Denied\nWrong Password");

    let right = server
        .get("/private/doc.html")
        .basic_auth("alice", Some("right"))
        .send()
        .await?;
    assert_eq!(right.status(), StatusCode::OK);
    assert_eq!(right.text().await?, "private doc");

    Ok(())
}

#[tokio::test]
async fn default_user_uses_fallback_password() -> Result<()> {
    let server = TestServer::start(Settings::default()).await?;

    let response = server
        .get("/private/doc.html")
        .basic_auth("admin", Some("fallback"))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn group_membership_is_enforced() -> Result<()> {
    let server = TestServer::start(Settings::default()).await?;

    let response = server
        .get("/admin/index.html")
        .basic_auth("eve", Some("pw"))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.text().await?, "Access Denied\nProhibited User");

    Ok(())
}

#[tokio::test]
async fn digest_challenge_and_response() -> Result<()> {
    let server = TestServer::start(Settings::default()).await?;

    let first = server.get("/admin/index.html").send().await?;
    assert_eq!(first.status(), StatusCode::UNAUTHORIZED);
    let header = challenge(&first);
    assert!(header.starts_with(r#"Digest realm="gatehouse""#), "{header}");
    let nonce = challenge_nonce(&header).context("challenge carries no nonce")?;

    let authorization = digest_header(
        "bob",
        "builder",
        &nonce,
        "/admin/index.html",
        "/admin/index.html",
    );
    let second = server
        .get("/admin/index.html")
        .header("Authorization", authorization)
        .send()
        .await?;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(second.text().await?, "admin area");

    Ok(())
}

#[tokio::test]
async fn digest_signed_over_full_target_is_accepted() -> Result<()> {
    let server = TestServer::start(Settings::default()).await?;

    let nonce = issued_nonce(&server, "/admin/index.html").await?;

    // Signed over the query-qualified target while claiming the bare uri.
    let mut authorization = digest_header(
        "bob",
        "builder",
        &nonce,
        "/admin/index.html?lang=en",
        "/admin/index.html?lang=en",
    );
    authorization = authorization.replace(
        r#"uri="/admin/index.html?lang=en""#,
        r#"uri="/admin/index.html""#,
    );

    let response = server
        .get("/admin/index.html?lang=en")
        .header("Authorization", authorization)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn wrong_digest_is_rejected_with_digest_challenge() -> Result<()> {
    let server = TestServer::start(Settings::default()).await?;
    let nonce = issued_nonce(&server, "/admin/index.html").await?;

    let authorization = digest_header(
        "bob",
        "not-the-password",
        &nonce,
        "/admin/index.html",
        "/admin/index.html",
    );
    let response = server
        .get("/admin/index.html")
        .header("Authorization", authorization)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(challenge(&response).starts_with("Digest "));
    assert_eq!(response.text().await?, "Access Denied\nWrong Password");

    Ok(())
}

#[tokio::test]
async fn digest_for_another_page_is_rejected() -> Result<()> {
    let server = TestServer::start(Settings::default()).await?;
    let nonce = issued_nonce(&server, "/admin/index.html").await?;

    let authorization = digest_header("bob", "builder", &nonce, "/index.html", "/index.html");
    let response = server
        .get("/admin/index.html")
        .header("Authorization", authorization)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn digest_with_made_up_nonce_is_rejected() -> Result<()> {
    let server = TestServer::start(Settings::default()).await?;

    let authorization = digest_header(
        "bob",
        "builder",
        "never-issued",
        "/admin/index.html",
        "/admin/index.html",
    );
    let response = server
        .get("/admin/index.html")
        .header("Authorization", authorization)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let fresh = challenge_nonce(&challenge(&response));
    assert!(fresh.is_some_and(|nonce| nonce != "never-issued"));

    Ok(())
}

#[tokio::test]
async fn secure_documents_need_tls() -> Result<()> {
    let server = TestServer::start(Settings::default()).await?;

    let response = server.get("/secure/doc.html").send().await?;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(
        response.text().await?,
        "Access Denied\nSecure access is required."
    );

    // The header is ignored unless the proxy is trusted.
    let forwarded = server
        .get("/secure/doc.html")
        .header("X-Forwarded-Proto", "https")
        .send()
        .await?;
    assert_eq!(forwarded.status(), StatusCode::METHOD_NOT_ALLOWED);

    Ok(())
}

#[tokio::test]
async fn absolute_https_target_does_not_make_plain_tcp_secure() -> Result<()> {
    let server = TestServer::start(Settings::default()).await?;

    for target in ["/secure/doc.html", "https://localhost/secure/doc.html"] {
        let response = raw_request(
            server.addr,
            &format!("GET {target} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"),
        )
        .await?;
        assert!(
            response.starts_with("HTTP/1.1 405"),
            "{target}: {}",
            response.lines().next().unwrap_or_default()
        );
        assert!(!response.contains("secure doc"));
    }

    Ok(())
}

#[tokio::test]
async fn trusted_proxy_connections_are_not_local() -> Result<()> {
    let server = TestServer::start(Settings {
        force_auth: false,
        trust_forwarded_proto: true,
        ..Settings::default()
    })
    .await?;

    let private = server
        .get("/private/doc.html")
        .header("X-Forwarded-Proto", "https")
        .send()
        .await?;
    assert_eq!(private.status(), StatusCode::UNAUTHORIZED);

    let hidden = server.get("/hidden/page.html").send().await?;
    assert_eq!(hidden.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn trusted_proxy_marks_transport_secure() -> Result<()> {
    let server = TestServer::start(Settings {
        trust_forwarded_proto: true,
        ..Settings::default()
    })
    .await?;

    let response = server
        .get("/secure/doc.html")
        .header("X-Forwarded-Proto", "https")
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await?, "secure doc");

    Ok(())
}

#[tokio::test]
async fn encoded_paths_do_not_dodge_limits() -> Result<()> {
    let server = TestServer::start(Settings::default()).await?;

    for path in ["/%70rivate/doc.html", "//private/doc.html", "/index/../private/doc.html"] {
        let response = server.get(path).send().await?;
        assert_ne!(response.status(), StatusCode::OK, "{path}");
    }

    Ok(())
}

#[tokio::test]
async fn local_callers_bypass_without_forced_auth() -> Result<()> {
    let server = TestServer::start(Settings {
        force_auth: false,
        ..Settings::default()
    })
    .await?;

    let hidden = server.get("/hidden/page.html").send().await?;
    assert_eq!(hidden.status(), StatusCode::OK);

    // Transport requirements still apply to local callers.
    let secure = server.get("/secure/doc.html").send().await?;
    assert_eq!(secure.status(), StatusCode::METHOD_NOT_ALLOWED);

    Ok(())
}

#[tokio::test]
async fn security_handler_can_be_left_out() -> Result<()> {
    let server = TestServer::start(Settings {
        secure: false,
        ..Settings::default()
    })
    .await?;

    let response = server.get("/private/doc.html").send().await?;
    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn health_reports_counters() -> Result<()> {
    let server = TestServer::start(Settings::default()).await?;

    // access denied: hidden, wrong password. errors: missing user id.
    server.get("/hidden/page.html").send().await?;
    server
        .get("/private/doc.html")
        .basic_auth("alice", Some("wrong"))
        .send()
        .await?;
    server.get("/private/doc.html").send().await?;

    let health: Value = server.get("/health").send().await?.json().await?;
    assert_eq!(health["name"], "gatehouse");
    assert_eq!(health["stats"]["access_denied"], 2);
    assert_eq!(health["stats"]["errors"], 1);

    Ok(())
}
