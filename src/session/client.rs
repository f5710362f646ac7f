//! TCP client for the script server
//!
//! Handles the `initialize` handshake and `runScript` request/response
//! exchange over a framed JSON stream.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::common::{Error, Result, SubmitError};

use super::codec;
use super::types::*;
use super::{Connector, ServerTarget, Session, SessionKind};

/// Client for one script server session
pub struct ScriptClient {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
    /// Sequence number for the next request
    seq: i64,
    request_timeout: Duration,
}

impl ScriptClient {
    /// Connect to the server and perform the `initialize` handshake
    pub async fn connect(
        target: &ServerTarget,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self> {
        let stream = tokio::time::timeout(
            connect_timeout,
            TcpStream::connect((target.host.as_str(), target.port)),
        )
        .await
        .map_err(|_| Error::Timeout(connect_timeout))??;
        stream.set_nodelay(true)?;

        let (reader, writer) = stream.into_split();
        let mut client = Self {
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
            seq: 1,
            request_timeout,
        };

        tokio::time::timeout(connect_timeout, client.initialize(target.kind))
            .await
            .map_err(|_| Error::Timeout(connect_timeout))??;

        Ok(client)
    }

    fn next_seq(&mut self) -> i64 {
        let seq = self.seq;
        self.seq += 1;
        seq
    }

    /// Send a request and wait for its response
    ///
    /// A response with `success == false` is returned as-is; the caller
    /// decides what a refusal means for that command.
    async fn request(&mut self, command: &str, arguments: Option<Value>) -> Result<ResponseMessage> {
        let seq = self.next_seq();
        let request = RequestMessage::new(seq, command, arguments);
        let json = serde_json::to_string(&request)?;
        tracing::debug!("server request: {} (seq {})", command, seq);

        codec::write_message(&mut self.writer, &json).await?;

        loop {
            let json = codec::read_message(&mut self.reader).await?;
            let msg: Value = serde_json::from_str(&json)
                .map_err(|e| Error::Protocol(format!("Invalid JSON: {}", e)))?;

            let msg_type = msg.get("type").and_then(|v| v.as_str()).unwrap_or("unknown");

            match msg_type {
                "response" => {
                    let response: ResponseMessage = serde_json::from_value(msg)?;
                    if response.request_seq < seq {
                        // Reply to a request abandoned after a timeout
                        tracing::debug!(
                            "Discarding stale response to seq {}",
                            response.request_seq
                        );
                        continue;
                    }
                    if response.request_seq > seq {
                        return Err(Error::Protocol(format!(
                            "Response sequence mismatch: expected {}, got {}",
                            seq, response.request_seq
                        )));
                    }
                    tracing::debug!(
                        "server response: {} success={}",
                        response.command,
                        response.success
                    );
                    return Ok(response);
                }
                "event" => {
                    tracing::debug!("server event: {}", json);
                }
                _ => {
                    tracing::warn!("Unknown message type: {}", msg_type);
                }
            }
        }
    }

    async fn initialize(&mut self, kind: SessionKind) -> Result<()> {
        let args = InitializeArguments {
            session_type: kind.language().to_string(),
        };
        let response = self
            .request("initialize", Some(serde_json::to_value(&args)?))
            .await?;

        if response.success {
            Ok(())
        } else {
            Err(Error::request_failed(
                "initialize",
                &response.message.unwrap_or_else(|| "Unknown error".to_string()),
            ))
        }
    }

    /// Run a script in the session
    pub async fn run_script(&mut self, code: &str) -> std::result::Result<(), SubmitError> {
        let args = RunScriptArguments {
            code: code.to_string(),
        };
        let args = serde_json::to_value(&args).map_err(Error::from)?;

        let timeout = self.request_timeout;
        let response = tokio::time::timeout(timeout, self.request("runScript", Some(args)))
            .await
            .map_err(|_| Error::Timeout(timeout))??;

        if response.success {
            Ok(())
        } else {
            Err(SubmitError::Execution(
                response.message.unwrap_or_else(|| "Unknown error".to_string()),
            ))
        }
    }
}

#[async_trait]
impl Session for ScriptClient {
    async fn run(&mut self, code: &str) -> std::result::Result<(), SubmitError> {
        self.run_script(code).await
    }
}

/// Opens [`ScriptClient`] sessions over TCP
#[derive(Debug, Clone)]
pub struct TcpConnector {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, target: &ServerTarget) -> Result<Box<dyn Session>> {
        let client = ScriptClient::connect(target, self.connect_timeout, self.request_timeout).await?;
        Ok(Box::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader as TokioBufReader;
    use tokio::net::TcpListener;

    /// Serve one connection: accept `initialize`, then answer each
    /// `runScript` with failure when the code contains "raise"
    async fn serve_once(listener: TcpListener) {
        let (stream, _) = listener.accept().await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut reader = TokioBufReader::new(reader);
        let mut seq = 1;
        while let Ok(json) = codec::read_message(&mut reader).await {
            let request: RequestMessage = serde_json::from_str(&json).unwrap();
            let code = request
                .arguments
                .as_ref()
                .and_then(|a| a.get("code"))
                .and_then(|c| c.as_str())
                .unwrap_or("");
            let response = if code.contains("raise") {
                ResponseMessage::failure(seq, &request, "RuntimeError")
            } else {
                ResponseMessage::success(seq, &request)
            };
            seq += 1;
            let body = serde_json::to_string(&response).unwrap();
            codec::write_message(&mut writer, &body).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_run_script_distinguishes_execution_errors() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(serve_once(listener));

        let target = ServerTarget::new("127.0.0.1", port, SessionKind::Python);
        let mut client =
            ScriptClient::connect(&target, Duration::from_secs(5), Duration::from_secs(5))
                .await
                .unwrap();

        assert_eq!(client.run_script("print(1)\n").await, Ok(()));
        assert_eq!(
            client.run_script("raise ValueError()\n").await,
            Err(SubmitError::Execution("RuntimeError".to_string()))
        );

        drop(client);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_server_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut reader = TokioBufReader::new(reader);
            let json = codec::read_message(&mut reader).await.unwrap();
            let request: RequestMessage = serde_json::from_str(&json).unwrap();
            let body = serde_json::to_string(&ResponseMessage::success(1, &request)).unwrap();
            codec::write_message(&mut writer, &body).await.unwrap();
            // Drop the connection after the handshake
        });

        let target = ServerTarget::new("127.0.0.1", port, SessionKind::Python);
        let mut client =
            ScriptClient::connect(&target, Duration::from_secs(5), Duration::from_secs(5))
                .await
                .unwrap();
        server.await.unwrap();

        let result = client.run_script("print(1)\n").await;
        assert!(matches!(result, Err(SubmitError::Transport(_))));
    }

    #[tokio::test]
    async fn test_late_reply_after_timeout_is_discarded() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut reader = TokioBufReader::new(reader);
            let mut seq = 1;
            while let Ok(json) = codec::read_message(&mut reader).await {
                let request: RequestMessage = serde_json::from_str(&json).unwrap();
                // First script answers well after the client gave up on it
                if request.seq == 2 {
                    tokio::time::sleep(Duration::from_millis(600)).await;
                }
                let body = serde_json::to_string(&ResponseMessage::success(seq, &request)).unwrap();
                seq += 1;
                codec::write_message(&mut writer, &body).await.unwrap();
            }
        });

        let target = ServerTarget::new("127.0.0.1", port, SessionKind::Python);
        let mut client =
            ScriptClient::connect(&target, Duration::from_secs(5), Duration::from_millis(300))
                .await
                .unwrap();

        match client.run_script("slow()\n").await {
            Err(SubmitError::Transport(message)) => {
                assert!(message.contains("300ms"), "{}", message);
            }
            other => panic!("expected a timeout, got {:?}", other),
        }
        for i in 0..3 {
            assert_eq!(client.run_script(&format!("x = {}\n", i)).await, Ok(()));
        }

        drop(client);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_reply_to_future_request_is_protocol_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut reader = TokioBufReader::new(reader);
            let json = codec::read_message(&mut reader).await.unwrap();
            let mut request: RequestMessage = serde_json::from_str(&json).unwrap();
            let body = serde_json::to_string(&ResponseMessage::success(1, &request)).unwrap();
            codec::write_message(&mut writer, &body).await.unwrap();

            let json = codec::read_message(&mut reader).await.unwrap();
            request = serde_json::from_str(&json).unwrap();
            request.seq += 10;
            let body = serde_json::to_string(&ResponseMessage::success(2, &request)).unwrap();
            codec::write_message(&mut writer, &body).await.unwrap();
        });

        let target = ServerTarget::new("127.0.0.1", port, SessionKind::Python);
        let mut client =
            ScriptClient::connect(&target, Duration::from_secs(5), Duration::from_secs(5))
                .await
                .unwrap();

        match client.run_script("print(1)\n").await {
            Err(SubmitError::Transport(message)) => {
                assert!(message.contains("sequence mismatch"), "{}", message);
            }
            other => panic!("expected a protocol error, got {:?}", other),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_refused_connection_is_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let target = ServerTarget::new("127.0.0.1", port, SessionKind::Groovy);
        let result =
            ScriptClient::connect(&target, Duration::from_secs(5), Duration::from_secs(5)).await;
        assert!(result.is_err());
    }
}
