// ── Event script parsing ──
//
// One producer event per line. `#` starts a comment; blank lines are
// skipped.

use std::net::Ipv4Addr;
use std::time::Duration;

use secrecy::SecretString;
use serde_json::Value;

use devlink_core::{ConnectivityEvent, ContentType, DisconnectReason, ProvisioningFailure};

#[derive(Debug)]
pub enum Step {
    /// Publish on the event bus.
    Publish(ConnectivityEvent),
    /// Cloud-to-device message.
    Message {
        content_type: ContentType,
        payload: String,
    },
    /// Direct method invocation with a JSON payload.
    Method { name: String, payload: Value },
    FactoryReset,
    Sleep(Duration),
}

/// Parse one script line. `Ok(None)` for blank and comment lines.
pub fn parse_line(line: &str) -> Result<Option<Step>, String> {
    let line = strip_comment(line).trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (keyword, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(k, r)| (k, r.trim()));
    let mut args = rest.split_whitespace();

    let step = match keyword {
        "link-started" => Step::Publish(ConnectivityEvent::LinkStarted),
        "disconnected" => {
            let reason = args
                .next()
                .map_or(Ok(0), str::parse::<u16>)
                .map_err(|e| format!("invalid disconnect reason: {e}"))?;
            Step::Publish(ConnectivityEvent::LinkDisconnected {
                reason: DisconnectReason(reason),
            })
        }
        "got-ip" => {
            let address = required(args.next(), "an IPv4 address")?
                .parse::<Ipv4Addr>()
                .map_err(|e| format!("invalid IPv4 address: {e}"))?;
            Step::Publish(ConnectivityEvent::IpAcquired { address })
        }
        "prov-started" => Step::Publish(ConnectivityEvent::ProvisioningStarted),
        "creds" => {
            let ssid = required(args.next(), "an SSID")?.to_owned();
            let secret = args.next().unwrap_or_default().to_owned();
            Step::Publish(ConnectivityEvent::CredentialsReceived {
                ssid,
                secret: SecretString::from(secret),
            })
        }
        "prov-failed" => {
            let cause = match required(args.next(), "a cause (auth|ap-not-found)")? {
                "auth" => ProvisioningFailure::AuthenticationError,
                "ap-not-found" => ProvisioningFailure::AccessPointNotFound,
                other => return Err(format!("unknown provisioning failure `{other}`")),
            };
            Step::Publish(ConnectivityEvent::ProvisioningFailed { cause })
        }
        "prov-success" => Step::Publish(ConnectivityEvent::ProvisioningSucceeded),
        "prov-end" => Step::Publish(ConnectivityEvent::ProvisioningEnded),
        "message" => {
            let (kind, payload) = rest
                .split_once(char::is_whitespace)
                .map_or((rest, ""), |(k, p)| (k, p.trim()));
            let content_type = match kind {
                "text" => ContentType::Text,
                "binary" => ContentType::Binary,
                "" => return Err("expected a content type (text|binary)".into()),
                other => return Err(format!("unknown content type `{other}`")),
            };
            Step::Message {
                content_type,
                payload: payload.to_owned(),
            }
        }
        "method" => {
            let (name, payload) = rest
                .split_once(char::is_whitespace)
                .map_or((rest, "{}"), |(n, p)| (n, p.trim()));
            if name.is_empty() {
                return Err("expected a method name".into());
            }
            let payload = serde_json::from_str(payload)
                .map_err(|e| format!("invalid method payload: {e}"))?;
            Step::Method {
                name: name.to_owned(),
                payload,
            }
        }
        "factory-reset" => Step::FactoryReset,
        "sleep" => {
            let ms = required(args.next(), "a duration in milliseconds")?
                .parse::<u64>()
                .map_err(|e| format!("invalid sleep duration: {e}"))?;
            Step::Sleep(Duration::from_millis(ms))
        }
        other => return Err(format!("unknown event `{other}`")),
    };
    Ok(Some(step))
}

/// Cut a trailing comment. `#` only opens one at the start of a line or
/// after whitespace, so secrets like `p#ss` survive.
fn strip_comment(line: &str) -> &str {
    let mut previous = None;
    for (at, c) in line.char_indices() {
        if c == '#' && previous.is_none_or(char::is_whitespace) {
            return &line[..at];
        }
        previous = Some(c);
    }
    line
}

fn required<'a>(arg: Option<&'a str>, what: &str) -> Result<&'a str, String> {
    arg.ok_or_else(|| format!("expected {what}"))
}
