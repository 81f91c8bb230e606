use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};

use minidrive::error::{CommandError, ProtocolError};
use minidrive::protocol::{Command, Request, Response, read_message, write_message};
use minidrive::server::{Server, ServerConfig};
use minidrive::transfer::{TransferEngine, TransferRequest};
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::sync::oneshot;

struct TestServer {
    root: TempDir,
    addr: SocketAddr,
    _shutdown: oneshot::Sender<()>,
}

impl TestServer {
    async fn start() -> Self {
        Self::start_with(None).await
    }

    async fn start_with(engine: Option<Arc<dyn TransferEngine>>) -> Self {
        let root = TempDir::new().unwrap();
        let mut server = Server::new(ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            root_dir: root.path().canonicalize().unwrap(),
        })
        .unwrap();
        if let Some(engine) = engine {
            server = server.with_transfer_engine(engine);
        }
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            server
                .run(listener, async {
                    let _ = rx.await;
                })
                .await;
        });
        Self {
            root,
            addr,
            _shutdown: tx,
        }
    }

    fn root(&self) -> &Path {
        self.root.path()
    }

    async fn connect(&self) -> Conn {
        Conn {
            stream: TcpStream::connect(self.addr).await.unwrap(),
        }
    }
}

struct Conn {
    stream: TcpStream,
}

impl Conn {
    async fn call(&mut self, request: Request) -> Response {
        write_message(&mut self.stream, &request).await.unwrap();
        read_message(&mut self.stream).await.unwrap()
    }

    async fn send(&mut self, command: Command, first: &str, second: &str) -> Response {
        self.call(Request::with_args(command, first, second)).await
    }

    async fn login_public(&mut self) {
        let response = self.send(Command::Login, "", "").await;
        assert_eq!((response.status.as_str(), response.code), ("OK", 200));
    }

    async fn register(&mut self, username: &str, password: &str) -> Response {
        let response = self.send(Command::Login, username, "").await;
        assert_eq!((response.status.as_str(), response.code), ("NEED_INPUT", 401));
        let response = self.send(Command::NeedInput, "Y", "").await;
        assert_eq!((response.status.as_str(), response.code), ("AUTH", 401));
        self.send(Command::Auth, password, "").await
    }
}

#[tokio::test]
async fn test_public_login_lands_in_public_files() {
    let server = TestServer::start().await;
    let mut conn = server.connect().await;

    let response = conn.send(Command::Login, "", "").await;
    assert_eq!(response.status, "OK");
    assert_eq!(response.code, 200);
    assert!(response.message.contains("public mode"));

    let response = conn.send(Command::Mkdir, "shared", "").await;
    assert_eq!(response.code, 200);
    assert!(server.root().join("public/files/shared").is_dir());
}

#[tokio::test]
async fn test_registration_creates_private_layout() {
    let server = TestServer::start().await;
    let mut conn = server.connect().await;

    let response = conn.register("alice", "secret").await;
    assert_eq!((response.status.as_str(), response.code), ("OK", 200));
    assert!(server.root().join("private/alice/files").is_dir());
    assert!(server.root().join("private/alice/.partial").is_dir());

    let users = std::fs::read_to_string(server.root().join("users.json")).unwrap();
    assert!(users.contains("alice"));
    assert!(!users.contains("secret"));
}

#[tokio::test]
async fn test_declined_registration_falls_back_to_public() {
    let server = TestServer::start().await;
    let mut conn = server.connect().await;

    conn.send(Command::Login, "bob", "").await;
    let response = conn.send(Command::NeedInput, "maybe", "").await;
    assert_eq!(response.code, 400);

    let response = conn.send(Command::NeedInput, "n", "").await;
    assert_eq!((response.status.as_str(), response.code), ("OK", 200));
    assert!(!server.root().join("private/bob").exists());
}

#[tokio::test]
async fn test_returning_user_must_give_correct_password() {
    let server = TestServer::start().await;
    let mut first = server.connect().await;
    first.register("alice", "secret").await;
    drop(first);

    let mut conn = server.connect().await;
    let response = conn.send(Command::Login, "alice", "").await;
    assert_eq!((response.status.as_str(), response.code), ("AUTH", 401));

    let response = conn.send(Command::Auth, "wrong", "").await;
    assert_eq!((response.status.as_str(), response.code), ("AUTH", 401));

    let response = conn.send(Command::List, "", "").await;
    assert_eq!(response.code, 503);

    let response = conn.send(Command::Auth, "secret", "").await;
    assert_eq!((response.status.as_str(), response.code), ("OK", 200));
}

#[tokio::test]
async fn test_mkdir_outside_sandbox_is_denied() {
    let server = TestServer::start().await;
    let mut conn = server.connect().await;
    conn.login_public().await;

    let response = conn.send(Command::Mkdir, "../../escape", "").await;
    assert_eq!((response.status.as_str(), response.code), ("ERROR", 403));
    assert!(!server.root().join("escape").exists());
}

#[tokio::test]
async fn test_mkdir_existing_directory_fails_precondition() {
    let server = TestServer::start().await;
    let mut conn = server.connect().await;
    conn.login_public().await;

    assert_eq!(conn.send(Command::Mkdir, "docs", "").await.code, 200);
    let response = conn.send(Command::Mkdir, "docs", "").await;
    assert_eq!((response.status.as_str(), response.code), ("ERROR", 412));
}

#[tokio::test]
async fn test_move_without_destination_is_rejected() {
    let server = TestServer::start().await;
    let mut conn = server.connect().await;
    conn.login_public().await;
    std::fs::write(server.root().join("public/files/a.txt"), b"a").unwrap();

    let response = conn.send(Command::Move, "a.txt", "").await;
    assert_eq!((response.status.as_str(), response.code), ("ERROR", 400));
    assert!(server.root().join("public/files/a.txt").exists());
}

#[tokio::test]
async fn test_cd_then_list_sees_relative_entries() {
    let server = TestServer::start().await;
    let mut conn = server.connect().await;
    conn.register("carol", "pw").await;

    assert_eq!(conn.send(Command::Mkdir, "work/notes", "").await.code, 200);
    assert_eq!(conn.send(Command::Cd, "work", "").await.code, 200);

    let response = conn.send(Command::List, "", "").await;
    assert_eq!(response.code, 200);
    assert!(response.message.contains("notes/"));

    let response = conn.send(Command::Cd, "..", "").await;
    assert_eq!(response.code, 200);
    let response = conn.send(Command::Cd, "..", "").await;
    assert_eq!(response.code, 403);
}

#[tokio::test]
async fn test_filesystem_commands_require_login() {
    let server = TestServer::start().await;
    let mut conn = server.connect().await;

    let response = conn.send(Command::List, "", "").await;
    assert_eq!((response.status.as_str(), response.code), ("ERROR", 503));
    let response = conn.send(Command::Auth, "pw", "").await;
    assert_eq!(response.code, 503);
}

#[tokio::test]
async fn test_unknown_command_is_bad_request() {
    let server = TestServer::start().await;
    let mut conn = server.connect().await;

    let response = conn
        .call(Request {
            cmd: "FROBNICATE".into(),
            ..Default::default()
        })
        .await;
    assert_eq!((response.status.as_str(), response.code), ("ERROR", 400));

    // The session is still usable afterwards.
    conn.login_public().await;
}

#[tokio::test]
async fn test_transfers_report_unavailable() {
    let server = TestServer::start().await;
    let mut conn = server.connect().await;
    conn.login_public().await;

    let response = conn.send(Command::Upload, "local.bin", "").await;
    assert_eq!(response.code, 503);
}

#[tokio::test]
async fn test_exit_closes_connection() {
    let server = TestServer::start().await;
    let mut conn = server.connect().await;
    conn.login_public().await;

    write_message(&mut conn.stream, &Request::new(Command::Exit))
        .await
        .unwrap();
    let result: Result<Response, ProtocolError> = read_message(&mut conn.stream).await;
    assert!(matches!(result, Err(ProtocolError::Closed)));
}

async fn assert_mutations_refused(conn: &mut Conn, root: &Path) {
    std::fs::write(root.join("public/files/keep.txt"), b"keep").unwrap();

    let attempts = [
        (Command::Mkdir, "made", ""),
        (Command::Delete, "keep.txt", ""),
        (Command::Move, "keep.txt", "moved.txt"),
        (Command::Copy, "keep.txt", "copied.txt"),
    ];
    for (command, first, second) in attempts {
        let response = conn.send(command, first, second).await;
        assert_eq!(
            (response.status.as_str(), response.code),
            ("ERROR", 503),
            "{command} was not refused"
        );
    }

    let files = root.join("public/files");
    assert_eq!(std::fs::read(files.join("keep.txt")).unwrap(), b"keep");
    for name in ["made", "moved.txt", "copied.txt"] {
        assert!(!files.join(name).exists(), "{name} was created");
    }
}

#[tokio::test]
async fn test_mutations_refused_before_login() {
    let server = TestServer::start().await;
    let mut conn = server.connect().await;
    assert_mutations_refused(&mut conn, server.root()).await;
}

#[tokio::test]
async fn test_mutations_refused_during_handshake() {
    let server = TestServer::start().await;
    let mut conn = server.connect().await;

    let response = conn.send(Command::Login, "erin", "").await;
    assert_eq!(response.status, "NEED_INPUT");
    assert_mutations_refused(&mut conn, server.root()).await;

    let response = conn.send(Command::NeedInput, "Y", "").await;
    assert_eq!(response.status, "AUTH");
    assert_mutations_refused(&mut conn, server.root()).await;

    let response = conn.send(Command::Auth, "pw", "").await;
    assert_eq!(response.code, 200);
}

#[tokio::test]
async fn test_concurrent_registrations_are_all_kept() {
    let server = TestServer::start().await;
    let names = ["ann", "ben", "cat", "dan"];

    let mut tasks = Vec::new();
    for name in names {
        let mut conn = server.connect().await;
        tasks.push(tokio::spawn(async move {
            let response = conn.register(name, name).await;
            assert_eq!(response.code, 200, "{name}: {}", response.message);
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    for name in names {
        let mut conn = server.connect().await;
        let response = conn.send(Command::Login, name, "").await;
        assert_eq!(response.status, "AUTH", "{name} was not persisted");
        let response = conn.send(Command::Auth, name, "").await;
        assert_eq!(response.code, 200);
    }
}

#[tokio::test]
async fn test_failed_provisioning_writes_no_account() {
    let server = TestServer::start().await;
    // A plain file where the user's directory should go.
    std::fs::write(server.root().join("private/dave"), b"").unwrap();

    let mut conn = server.connect().await;
    let response = conn.register("dave", "pw").await;
    assert_eq!((response.status.as_str(), response.code), ("ERROR", 500));

    let users = std::fs::read_to_string(server.root().join("users.json")).unwrap();
    assert!(!users.contains("dave"));

    let response = conn.send(Command::List, "", "").await;
    assert_eq!(response.code, 503);
}

#[tokio::test]
async fn test_overlong_username_is_rejected() {
    let server = TestServer::start().await;
    let mut conn = server.connect().await;

    let response = conn.send(Command::Login, &"u".repeat(300), "").await;
    assert_eq!((response.status.as_str(), response.code), ("ERROR", 400));

    let users = std::fs::read_to_string(server.root().join("users.json")).unwrap();
    assert!(!users.contains("uuuu"));
    conn.login_public().await;
}

#[derive(Default)]
struct AcceptingEngine {
    uploads: Mutex<Vec<TransferRequest>>,
}

impl TransferEngine for AcceptingEngine {
    fn upload(&self, request: TransferRequest) -> Result<String, CommandError> {
        self.uploads.lock().unwrap().push(request);
        Ok("Upload accepted.".into())
    }

    fn download(&self, _request: TransferRequest) -> Result<String, CommandError> {
        Ok("Download accepted.".into())
    }

    fn sync(&self, _request: TransferRequest) -> Result<String, CommandError> {
        Ok("Sync accepted.".into())
    }
}

#[tokio::test]
async fn test_custom_engine_receives_sandboxed_uploads() {
    let engine = Arc::new(AcceptingEngine::default());
    let plugged: Arc<dyn TransferEngine> = engine.clone();
    let server = TestServer::start_with(Some(plugged)).await;
    let mut conn = server.connect().await;
    conn.login_public().await;

    let mut request = Request::with_args(Command::Upload, "/tmp/report.pdf", "");
    request.size = 7;
    let response = conn.call(request).await;
    assert_eq!((response.code, response.message.as_str()), (200, "Upload accepted."));

    let response = conn.send(Command::Upload, "report.pdf", "../../stolen.pdf").await;
    assert_eq!(response.code, 403);

    let uploads = engine.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0].target.ends_with("public/files/report.pdf"));
    assert_eq!(uploads[0].size, 7);
}
