//! Line-delimited JSON transport.
//!
//! Reads one request per line and writes one [`Reply`] per line, in request order. A line that
//! is not valid JSON is answered with an error reply and the loop carries on. Blank lines are
//! skipped.

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use docbus_core::{
    error::{ErrorReply, StoreError},
    service::{Reply, StoreService},
};

/// Serves requests from `reader` until end of input.
pub async fn serve<R, W>(service: &StoreService, reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<Value>(line) {
            Ok(request) => service.reply(request).await,
            Err(err) => {
                warn!(error = %err, "malformed request");
                Reply::Error(ErrorReply::from(&StoreError::from(err)))
            }
        };

        write_reply(&mut writer, &reply).await?;
    }

    info!("input closed");
    Ok(())
}

async fn write_reply<W>(writer: &mut W, reply: &Reply) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let json = serde_json::to_string(reply)?;

    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryServer;
    use docbus_core::{driver::ConnectionOptions, resolver::ConnectionSource};
    use serde_json::json;

    fn service() -> StoreService {
        let server = MemoryServer::builder().database("test").build();

        StoreService::builder(ConnectionSource::options(
            ConnectionOptions::new("memory://", "test"),
            server,
        ))
        .build()
    }

    async fn replies(input: &str) -> Vec<Value> {
        let mut output = Vec::new();
        serve(&service(), input.as_bytes(), &mut output).await.unwrap();

        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn answers_each_line_in_order_and_survives_bad_input() {
        let input = concat!(
            r#"{"topic":"arango-store","cmd":"createCollection","name":"users"}"#,
            "\n",
            "   \n",
            "{not json\n",
            r#"{"topic":"arango-store","cmd":"count","collection":"users","query":{}}"#,
            "\n",
        );

        let replies = replies(input).await;

        assert_eq!(replies.len(), 3);
        assert_eq!(replies[0]["result"]["name"], json!("users"));
        assert_eq!(replies[1]["error"]["name"], json!("SerializationError"));
        assert_eq!(replies[2], json!({ "result": 0 }));
    }

    #[tokio::test]
    async fn empty_input_produces_no_replies() {
        assert!(replies("").await.is_empty());
        assert!(replies("\n\n").await.is_empty());
    }

    #[tokio::test]
    async fn request_errors_are_replied_not_raised() {
        let replies = replies(r#"{"topic":"arango-store","cmd":"nope"}"#).await;

        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["error"]["name"], json!("PatternNotFound"));
    }
}
