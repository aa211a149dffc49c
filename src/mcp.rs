//! MCP server over stdin/stdout. JSON-RPC messages travel either with
//! `Content-Length` framing or as bare newline-delimited JSON; responses
//! always go out framed. stdout belongs to the protocol, so all diagnostics
//! go to stderr.

use std::io::{self, BufRead, BufReader, Read, Write};

use crate::{
    execute_tool, media_resource_uri, read_media_resource, tool_definitions_json, MediaFetcher,
    MediaStore,
};

const MAX_MESSAGE_BYTES: usize = 10 * 1024 * 1024;

pub(crate) fn read_mcp_message(
    reader: &mut BufReader<impl Read>,
) -> io::Result<Option<serde_json::Value>> {
    let mut first_line = String::new();
    if reader.read_line(&mut first_line)? == 0 {
        return Ok(None);
    }
    if first_line.trim().is_empty() {
        return Ok(None);
    }

    if first_line
        .to_ascii_lowercase()
        .starts_with("content-length:")
    {
        let mut content_length = parse_content_length(&first_line).unwrap_or(0);

        // Consume remaining headers up to the blank separator line.
        loop {
            let mut line = String::new();
            reader.read_line(&mut line)?;
            if line == "\r\n" || line == "\n" || line.is_empty() {
                break;
            }
            if line.to_ascii_lowercase().starts_with("content-length:") {
                content_length = parse_content_length(&line).unwrap_or(content_length);
            }
        }

        if content_length == 0 {
            return Ok(None);
        }
        if content_length > MAX_MESSAGE_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("message too large ({content_length} bytes)"),
            ));
        }
        let mut buffer = vec![0u8; content_length];
        reader.read_exact(&mut buffer)?;
        let value = serde_json::from_slice(&buffer).map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("invalid json: {e}"))
        })?;
        Ok(Some(value))
    } else {
        let value = serde_json::from_str(first_line.trim()).map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("invalid json: {e}"))
        })?;
        Ok(Some(value))
    }
}

fn parse_content_length(line: &str) -> Option<usize> {
    line.split(':').nth(1).and_then(|v| v.trim().parse().ok())
}

pub(crate) fn write_mcp_response(
    writer: &mut impl Write,
    value: &serde_json::Value,
) -> io::Result<()> {
    let payload = serde_json::to_vec(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("{e}")))?;
    write!(writer, "Content-Length: {}\r\n\r\n", payload.len())?;
    writer.write_all(&payload)?;
    writer.flush()
}

/// Serve MCP until stdin closes or a shutdown request arrives. The fetcher
/// is optional; without it the cache tools still work and anything needing
/// the platform reports a configuration error per call.
pub(crate) fn run_mcp_server(
    store: &mut MediaStore,
    fetcher: Option<&dyn MediaFetcher>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut reader = BufReader::new(io::stdin());
    let mut writer = io::stdout();
    let tools = tool_definitions_json();

    loop {
        let Some(msg) = read_mcp_message(&mut reader)? else {
            break;
        };
        let id = msg.get("id").cloned();
        let has_id = id.as_ref().is_some_and(|v| !v.is_null());
        let method = msg.get("method").and_then(|m| m.as_str()).unwrap_or("");
        let params = msg
            .get("params")
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}));

        let response = match method {
            "initialize" => {
                let protocol = params
                    .get("protocolVersion")
                    .and_then(|v| v.as_str())
                    .unwrap_or("2024-11-05");
                serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": {
                        "protocolVersion": protocol,
                        "capabilities": {
                            "tools": { "list": true, "call": true },
                            "resources": { "list": true, "read": true }
                        },
                        "serverInfo": {
                            "name": "telegram-mcp",
                            "version": env!("CARGO_PKG_VERSION")
                        }
                    }
                })
            }
            "tools/list" => serde_json::json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": { "tools": tools }
            }),
            "tools/call" => {
                let name = params.get("name").and_then(|v| v.as_str()).unwrap_or("");
                let arguments = params
                    .get("arguments")
                    .cloned()
                    .unwrap_or_else(|| serde_json::json!({}));
                match execute_tool(name, arguments, store, fetcher) {
                    Ok(result) => serde_json::json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "result": {
                            "content": [
                                { "type": "text", "text": result.output }
                            ],
                            "details": result.details,
                            "isError": result.is_error
                        }
                    }),
                    Err(err) => serde_json::json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "error": { "code": -32000, "message": err }
                    }),
                }
            }
            "resources/list" => {
                let resources = list_media_resources(store);
                serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": { "resources": resources }
                })
            }
            "resources/read" => {
                let uri = params.get("uri").and_then(|v| v.as_str()).unwrap_or("");
                match read_media_resource(store, uri) {
                    Ok(content) => serde_json::json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "result": {
                            "contents": [serde_json::to_value(&content)?]
                        }
                    }),
                    Err(err) => serde_json::json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "error": { "code": -32002, "message": err }
                    }),
                }
            }
            "shutdown" => {
                let response = serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": null
                });
                write_mcp_response(&mut writer, &response)?;
                break;
            }
            _ => {
                if !has_id {
                    // Notification for a method we do not handle.
                    continue;
                }
                serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": -32601, "message": "method not found" }
                })
            }
        };

        if has_id {
            write_mcp_response(&mut writer, &response)?;
        }
    }

    Ok(())
}

/// Current cache contents as resource descriptors. Listing triggers the
/// store's stale-entry reconciliation, so every URI handed out here points
/// at a file that existed a moment ago.
fn list_media_resources(store: &mut MediaStore) -> Vec<serde_json::Value> {
    let entries = match store.list_media() {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("[mcp] resources/list: {e}");
            return Vec::new();
        }
    };
    entries
        .iter()
        .map(|entry| {
            serde_json::json!({
                "uri": media_resource_uri(entry.chat_id, entry.message_id),
                "name": crate::file_basename(&entry.path),
                "mimeType": entry.mime_type,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn framed_message_round_trips() {
        let payload = serde_json::json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list" });
        let mut encoded = Vec::new();
        write_mcp_response(&mut encoded, &payload).unwrap();

        let mut reader = BufReader::new(Cursor::new(encoded));
        let decoded = read_mcp_message(&mut reader).unwrap().unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn bare_json_line_is_accepted() {
        let input = b"{\"jsonrpc\":\"2.0\",\"id\":7,\"method\":\"shutdown\"}\n".to_vec();
        let mut reader = BufReader::new(Cursor::new(input));
        let decoded = read_mcp_message(&mut reader).unwrap().unwrap();
        assert_eq!(decoded["id"], 7);
    }

    #[test]
    fn eof_yields_none() {
        let mut reader = BufReader::new(Cursor::new(Vec::new()));
        assert!(read_mcp_message(&mut reader).unwrap().is_none());
    }

    #[test]
    fn oversized_message_is_rejected() {
        let input = format!("Content-Length: {}\r\n\r\n", MAX_MESSAGE_BYTES + 1).into_bytes();
        let mut reader = BufReader::new(Cursor::new(input));
        assert!(read_mcp_message(&mut reader).is_err());
    }
}
