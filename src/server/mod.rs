//! Line-delimited JSON-RPC tool server
//!
//! Reads one request per line and writes one response per line. Each line is
//! handled to completion before the next is read.

pub mod dispatcher;
pub mod protocol;
pub mod tools;

use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

pub use dispatcher::Dispatcher;
pub use protocol::{Response, ToolError};
pub use tools::{Request, ToolCall};

use crate::Result;

/// Serve requests until EOF or until `shutdown` resolves, then close the
/// dispatcher's stores.
///
/// The shutdown future is only observed between lines; a request in flight
/// always finishes.
pub async fn serve<R, W, S>(
    dispatcher: &mut Dispatcher,
    mut reader: R,
    mut writer: W,
    shutdown: S,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    S: Future<Output = ()>,
{
    let mut buf = Vec::new();
    tokio::pin!(shutdown);

    loop {
        buf.clear();
        let read = tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutdown requested, stopping server");
                break;
            }
            read = reader.read_until(b'\n', &mut buf) => read?,
        };
        if read == 0 {
            tracing::info!("Input closed, stopping server");
            break;
        }

        // Invalid UTF-8 decodes to a line that fails JSON parsing and gets a
        // null-id error response.
        let line = String::from_utf8_lossy(&buf);
        if let Some(response) = dispatcher.handle_line(&line) {
            writer.write_all(response.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
    }

    dispatcher.close()
}

/// Serve over stdin/stdout until EOF, Ctrl-C or SIGTERM
pub async fn run_stdio(dispatcher: &mut Dispatcher) -> Result<()> {
    tracing::info!("Tool server listening on stdio");
    let reader = BufReader::new(tokio::io::stdin());
    serve(dispatcher, reader, tokio::io::stdout(), shutdown_signal()).await
}

/// Resolves on Ctrl-C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryService;
    use crate::scanner::Scanner;
    use crate::storage::UnitStore;
    use crate::unit::UnitRecord;
    use serde_json::Value;

    fn dispatcher(dir: &std::path::Path) -> Dispatcher {
        let db = dir.join("cache.db");
        let mut writer = UnitStore::open(&db).unwrap();
        writer
            .upsert(&UnitRecord::new("com.acme.Foo", "/repo/a.jar", b"foo".to_vec(), 1))
            .unwrap();
        let reader = UnitStore::open_read_only(&db).unwrap();
        Dispatcher::new(Scanner::new(writer, dir.to_path_buf(), "jar"), QueryService::new(reader))
    }

    #[tokio::test]
    async fn test_serve_answers_each_line_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut d = dispatcher(dir.path());

        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#, "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#, "\n",
            "\n",
            "garbage\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"search_class","arguments":{"query":"Foo"}}}"#, "\n",
        );
        let mut output = Vec::new();
        serve(&mut d, input.as_bytes(), &mut output, std::future::pending::<()>())
            .await
            .unwrap();

        let responses: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[1]["id"], Value::Null);
        assert_eq!(responses[1]["error"]["code"], -32603);
        assert_eq!(responses[2]["id"], 2);
        assert!(
            responses[2]["result"]["content"][0]["text"]
                .as_str()
                .unwrap()
                .contains("com.acme.Foo")
        );
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown_and_closes_stores() {
        let dir = tempfile::tempdir().unwrap();
        let mut d = dispatcher(dir.path());

        let (client, server) = tokio::io::duplex(64);
        let mut output = Vec::new();
        serve(&mut d, BufReader::new(server), &mut output, async {}).await.unwrap();
        drop(client);

        assert!(output.is_empty());
        let line = d
            .handle_line(r#"{"id":1,"method":"tools/call","params":{"name":"search_class","arguments":{"query":"Foo"}}}"#)
            .unwrap();
        let response: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(response["error"]["code"], -32603);
    }

    #[tokio::test]
    async fn test_serve_survives_invalid_utf8_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut d = dispatcher(dir.path());

        let input: &[u8] = b"\xff\xfe garbage\n{\"id\":2,\"method\":\"initialize\"}\n";
        let mut output = Vec::new();
        serve(&mut d, input, &mut output, std::future::pending::<()>())
            .await
            .unwrap();

        let responses: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], Value::Null);
        assert_eq!(responses[0]["error"]["code"], -32603);
        assert_eq!(responses[1]["id"], 2);
        assert_eq!(responses[1]["result"]["serverInfo"]["name"], "jarindex");
    }

    #[tokio::test]
    async fn test_serve_handles_final_line_without_newline() {
        let dir = tempfile::tempdir().unwrap();
        let mut d = dispatcher(dir.path());

        let input = r#"{"jsonrpc":"2.0","id":7,"method":"tools/list"}"#;
        let mut output = Vec::new();
        serve(&mut d, input.as_bytes(), &mut output, std::future::pending::<()>())
            .await
            .unwrap();

        let response: Value = serde_json::from_str(String::from_utf8(output).unwrap().trim()).unwrap();
        assert_eq!(response["id"], 7);
    }
}
