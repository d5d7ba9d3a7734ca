//! IPC message dispatch — parse s-expressions and route to handlers.

use lexpr::Value;
use tracing::{debug, warn};

use crate::engine::{ControlEngine, ControlMode};

use super::server::IpcClient;

/// Parse an s-expression message and dispatch to the appropriate handler.
/// Returns an optional response string (s-expression).
pub fn handle_message(
    engine: &mut ControlEngine,
    client: &mut IpcClient,
    shutdown_requested: &mut bool,
    raw: &str,
) -> Option<String> {
    let value = match lexpr::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!(client_id = client.id, "malformed s-expression: {}", e);
            return Some(error_response(0, &format!("malformed s-expression: {e}")));
        }
    };

    let msg_type = get_keyword(&value, "type");
    let msg_id = get_int(&value, "id").unwrap_or(0);

    // Hello must be the first message on a connection.
    match msg_type.as_deref() {
        Some("hello") => handle_hello(engine, client, msg_id, &value),
        _ if !client.authenticated => Some(error_response(msg_id, "hello handshake required")),
        Some("ping") => handle_ping(msg_id, &value),
        Some("status") => handle_status(engine, msg_id),
        Some("config") => handle_config(engine, msg_id),
        Some("set-mode") => handle_set_mode(engine, msg_id, &value),
        Some("set-brightness") => handle_set_brightness(engine, msg_id, &value),
        Some("set-volume") => handle_set_volume(engine, msg_id, &value),
        Some("shutdown") => {
            *shutdown_requested = true;
            Some(ok_response(msg_id))
        }
        Some(other) => Some(error_response(
            msg_id,
            &format!("unknown message type: {other}"),
        )),
        None => Some(error_response(msg_id, "missing :type field")),
    }
}

// ── Handlers ────────────────────────────────────────────────

fn handle_hello(
    engine: &ControlEngine,
    client: &mut IpcClient,
    msg_id: i64,
    value: &Value,
) -> Option<String> {
    let version = get_int(value, "version").unwrap_or(0);
    if version != 1 {
        return Some(error_response(
            msg_id,
            &format!("unsupported protocol version: {version}"),
        ));
    }

    // SO_PEERCRED: verify peer UID matches our UID.
    // This prevents other users on the same host from connecting.
    if let Some(peer_uid) = client.peer_uid {
        let our_uid = unsafe { libc::getuid() };
        if peer_uid != our_uid {
            warn!(
                client_id = client.id,
                peer_uid, our_uid, "rejecting client: UID mismatch"
            );
            return Some(error_response(msg_id, "authentication failed: UID mismatch"));
        }
    }

    let client_name = get_string(value, "client").unwrap_or_default();
    debug!(client_id = client.id, client_name, "hello handshake (authenticated)");

    client.authenticated = true;

    let pid_field = client
        .peer_pid
        .map(|p| format!(" :peer-pid {}", p))
        .unwrap_or_default();
    Some(format!(
        "(:type :hello :id {} :version 1 :server \"attune\" :mode :{}{})",
        msg_id,
        engine.mode().as_str(),
        pid_field
    ))
}

fn handle_ping(msg_id: i64, value: &Value) -> Option<String> {
    let client_ts = get_int(value, "timestamp").unwrap_or(0);
    let server_ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);

    Some(format!(
        "(:type :response :id {} :status :ok :client-timestamp {} :server-timestamp {})",
        msg_id, client_ts, server_ts
    ))
}

fn handle_status(engine: &ControlEngine, msg_id: i64) -> Option<String> {
    Some(format!(
        "(:type :response :id {} :status :ok :state {})",
        msg_id,
        engine.status_sexp()
    ))
}

fn handle_config(engine: &ControlEngine, msg_id: i64) -> Option<String> {
    Some(format!(
        "(:type :response :id {} :status :ok :config {})",
        msg_id,
        engine.config_sexp()
    ))
}

fn handle_set_mode(engine: &mut ControlEngine, msg_id: i64, value: &Value) -> Option<String> {
    let mode_str = match get_string(value, "mode") {
        Some(s) => s,
        None => return Some(error_response(msg_id, "missing :mode field")),
    };
    match ControlMode::from_str(&mode_str) {
        Some(mode) => {
            engine.set_mode(mode);
            Some(ok_response(msg_id))
        }
        None => Some(error_response(
            msg_id,
            &format!("unknown mode: {mode_str}"),
        )),
    }
}

fn handle_set_brightness(engine: &mut ControlEngine, msg_id: i64, value: &Value) -> Option<String> {
    let percent = match get_float(value, "value") {
        Some(v) => v as f32,
        None => return Some(error_response(msg_id, "missing :value field")),
    };
    let applied = engine.force_brightness(percent);
    Some(format!(
        "(:type :response :id {} :status :ok :applied {})",
        msg_id,
        applied
            .map(|v| v.to_string())
            .unwrap_or_else(|| "nil".to_string())
    ))
}

fn handle_set_volume(engine: &mut ControlEngine, msg_id: i64, value: &Value) -> Option<String> {
    let level = match get_float(value, "value") {
        Some(v) => v as f32,
        None => return Some(error_response(msg_id, "missing :value field")),
    };
    let applied = engine.force_volume(level);
    Some(format!(
        "(:type :response :id {} :status :ok :applied {})",
        msg_id,
        applied
            .map(|v| format!("{v:.2}"))
            .unwrap_or_else(|| "nil".to_string())
    ))
}

// ── Helpers ────────────────────────────────────────────────

fn ok_response(id: i64) -> String {
    format!("(:type :response :id {} :status :ok)", id)
}

fn error_response(id: i64, reason: &str) -> String {
    format!(
        "(:type :response :id {} :status :error :reason \"{}\")",
        id,
        escape_string(reason)
    )
}

/// Escape a string for s-expression output.
fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Extract a keyword value from an s-expression plist.
/// Walks cons pairs directly to find `:key` followed by its value.
/// Handles both `Value::Keyword("key")` (elisp parser) and
/// `Value::Symbol(":key")` (default parser) forms.
fn get_keyword(value: &Value, key: &str) -> Option<String> {
    let prefixed = format!(":{}", key);
    let mut current = value;
    loop {
        match current {
            Value::Cons(pair) => {
                let car = pair.car();
                let is_key = match car {
                    Value::Keyword(k) => k.as_ref() == key,
                    Value::Symbol(s) => s.as_ref() == prefixed,
                    _ => false,
                };
                if is_key {
                    // Value is the car of the next cons cell
                    if let Value::Cons(next) = pair.cdr() {
                        let val = next.car();
                        return match val {
                            Value::Keyword(v) => Some(v.to_string()),
                            Value::Symbol(v) => {
                                let s = v.to_string();
                                Some(s.strip_prefix(':').unwrap_or(&s).to_string())
                            }
                            Value::String(v) => Some(v.to_string()),
                            Value::Number(n) => Some(n.to_string()),
                            Value::Bool(b) => Some(if *b { "t" } else { "nil" }.to_string()),
                            Value::Null => Some("nil".to_string()),
                            _ => Some(val.to_string()),
                        };
                    }
                    return None;
                }
                current = pair.cdr();
            }
            _ => break,
        }
    }
    None
}

/// Extract an integer value from an s-expression plist.
fn get_int(value: &Value, key: &str) -> Option<i64> {
    get_keyword(value, key).and_then(|s| s.parse().ok())
}

/// Extract a string value from an s-expression plist.
fn get_string(value: &Value, key: &str) -> Option<String> {
    get_keyword(value, key)
}

/// Extract a floating-point value from an s-expression plist.
fn get_float(value: &Value, key: &str) -> Option<f64> {
    get_keyword(value, key).and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_keyword_forms() {
        let v = lexpr::from_str("(:type :status :id 7 :mode \"hybrid\")").unwrap();
        assert_eq!(get_keyword(&v, "type").as_deref(), Some("status"));
        assert_eq!(get_int(&v, "id"), Some(7));
        assert_eq!(get_string(&v, "mode").as_deref(), Some("hybrid"));
        assert_eq!(get_keyword(&v, "missing"), None);
    }

    #[test]
    fn test_get_float_parses_numbers() {
        let v = lexpr::from_str("(:type :set-volume :id 1 :value 0.75)").unwrap();
        assert_eq!(get_float(&v, "value"), Some(0.75));
    }

    #[test]
    fn test_error_response_escapes_quotes() {
        let resp = error_response(3, "bad \"mode\"");
        assert!(resp.contains("\\\"mode\\\""));
        assert!(resp.contains(":id 3"));
    }
}
