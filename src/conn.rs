//! Connection manager, dial step (4.E, steps 1-2): open the socket and
//! hand back a ready-to-frame `Transport`.

use std::io;

use tokio::net::TcpStream;
use url::Url;

use crate::error::{LdapError, Result};
use crate::settings::LdapConnSettings;

/// A connected byte-stream, plain or TLS, framed with `LdapCodec`
/// exclusively by the actor task.
pub enum Transport {
    Plain(TcpStream),
    #[cfg(feature = "tls")]
    Tls(Box<tokio_native_tls::TlsStream<TcpStream>>),
    #[cfg(unix)]
    Unix(tokio::net::UnixStream),
}

impl tokio::io::AsyncRead for Transport {
    fn poll_read(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(s) => std::pin::Pin::new(s).poll_read(cx, buf),
            #[cfg(feature = "tls")]
            Transport::Tls(s) => std::pin::Pin::new(s.as_mut()).poll_read(cx, buf),
            #[cfg(unix)]
            Transport::Unix(s) => std::pin::Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl tokio::io::AsyncWrite for Transport {
    fn poll_write(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<io::Result<usize>> {
        match self.get_mut() {
            Transport::Plain(s) => std::pin::Pin::new(s).poll_write(cx, buf),
            #[cfg(feature = "tls")]
            Transport::Tls(s) => std::pin::Pin::new(s.as_mut()).poll_write(cx, buf),
            #[cfg(unix)]
            Transport::Unix(s) => std::pin::Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(s) => std::pin::Pin::new(s).poll_flush(cx),
            #[cfg(feature = "tls")]
            Transport::Tls(s) => std::pin::Pin::new(s.as_mut()).poll_flush(cx),
            #[cfg(unix)]
            Transport::Unix(s) => std::pin::Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(s) => std::pin::Pin::new(s).poll_shutdown(cx),
            #[cfg(feature = "tls")]
            Transport::Tls(s) => std::pin::Pin::new(s.as_mut()).poll_shutdown(cx),
            #[cfg(unix)]
            Transport::Unix(s) => std::pin::Pin::new(s).poll_shutdown(cx),
        }
    }
}

async fn dial_plain(host: &str, port: u16) -> Result<TcpStream> {
    TcpStream::connect((host, port))
        .await
        .map_err(|e| LdapError::Connection(format!("connecting to {host}:{port} failed: {e}")))
}

#[cfg(feature = "tls")]
async fn dial_tls(host: &str, port: u16, settings: &LdapConnSettings) -> Result<Transport> {
    let stream = dial_plain(host, port).await?;
    let mut builder = native_tls::TlsConnector::builder();
    if settings.no_tls_verify() {
        builder.danger_accept_invalid_certs(true);
        builder.danger_accept_invalid_hostnames(true);
    }
    let connector = builder
        .build()
        .map_err(|e| LdapError::Connection(format!("TLS setup failed: {e}")))?;
    let connector = tokio_native_tls::TlsConnector::from(connector);
    let tls_stream = connector
        .connect(host, stream)
        .await
        .map_err(|e| LdapError::Connection(format!("TLS handshake failed: {e}")))?;
    Ok(Transport::Tls(Box::new(tls_stream)))
}

/// Dial step of the connection manager (4.E steps 1-2): parse the
/// endpoint, open the plain or TLS socket, apply the connect timeout if
/// configured, and negotiate StartTLS when asked to.
pub async fn dial(url: &str, settings: &LdapConnSettings) -> Result<Transport> {
    let parsed = Url::parse(url)?;

    let attempt = async {
        match parsed.scheme() {
            "ldap" => {
                let host = parsed
                    .host_str()
                    .ok_or_else(|| LdapError::InvalidArgument("URL missing host".to_string()))?
                    .to_string();
                let port = parsed.port().unwrap_or(389);
                let stream = dial_plain(&host, port).await?;
                if settings.starttls() {
                    #[cfg(feature = "tls")]
                    {
                        dial_starttls(stream, &host, settings).await
                    }
                    #[cfg(not(feature = "tls"))]
                    {
                        Err(LdapError::Connection(
                            "StartTLS requires the `tls` feature".to_string(),
                        ))
                    }
                } else {
                    Ok(Transport::Plain(stream))
                }
            }
            #[cfg(feature = "tls")]
            "ldaps" => {
                let host = parsed
                    .host_str()
                    .ok_or_else(|| LdapError::InvalidArgument("URL missing host".to_string()))?
                    .to_string();
                let port = parsed.port().unwrap_or(636);
                dial_tls(&host, port, settings).await
            }
            #[cfg(not(feature = "tls"))]
            "ldaps" => Err(LdapError::Connection(
                "ldaps:// requires the `tls` feature".to_string(),
            )),
            #[cfg(unix)]
            "ldapi" => {
                let path = ldapi_socket_path(&parsed)?;
                dial_unix(&path).await
            }
            #[cfg(not(unix))]
            "ldapi" => Err(LdapError::Connection(
                "ldapi:// requires a Unix platform".to_string(),
            )),
            other => Err(LdapError::InvalidArgument(format!(
                "unsupported URL scheme {other}"
            ))),
        }
    };

    match settings.conn_timeout() {
        Some(timeout) if !timeout.is_zero() => {
            tokio::time::timeout(timeout, attempt)
                .await
                .map_err(|_| LdapError::Connection("connection timeout".to_string()))?
        }
        _ => attempt.await,
    }
}

/// Unix-domain-socket endpoints are spelled `ldapi://<percent-encoded
/// path>` (the OpenLDAP convention); the path rides in the host
/// component since `ldapi://` URLs carry no authority of their own.
#[cfg(unix)]
fn ldapi_socket_path(parsed: &Url) -> Result<String> {
    let encoded = parsed.host_str().filter(|h| !h.is_empty()).or_else(|| {
        let p = parsed.path();
        if p.is_empty() {
            None
        } else {
            Some(p)
        }
    });
    let encoded = encoded
        .ok_or_else(|| LdapError::InvalidArgument("ldapi:// URL missing socket path".to_string()))?;
    Ok(percent_decode(encoded))
}

#[cfg(unix)]
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(byte) = u8::from_str_radix(&s[i + 1..i + 3], 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Dial a Unix-domain socket endpoint (6: `socketPath`).
#[cfg(unix)]
pub async fn dial_unix(path: &str) -> Result<Transport> {
    tokio::net::UnixStream::connect(path)
        .await
        .map(Transport::Unix)
        .map_err(|e| LdapError::Connection(format!("connecting to {path} failed: {e}")))
}

/// Negotiate StartTLS (RFC 4511 §4.14.1, OID
/// `1.3.6.1.4.1.1466.20037`) on an already-connected plain socket, then
/// upgrade it in place to a TLS stream.
#[cfg(feature = "tls")]
async fn dial_starttls(
    stream: TcpStream,
    host: &str,
    settings: &LdapConnSettings,
) -> Result<Transport> {
    use futures_util::{SinkExt, StreamExt};
    use lber::common::TagClass;
    use lber::structures::{OctetString, Sequence, Tag};
    use tokio_util::codec::Framed;

    use crate::codec::{LdapCodec, OutMessage};
    use crate::message::app;

    const START_TLS_OID: &str = "1.3.6.1.4.1.1466.20037";

    let mut framed = Framed::new(stream, LdapCodec);
    let req = Tag::Sequence(Sequence {
        id: app::EXTENDED_REQUEST,
        class: TagClass::Application,
        inner: vec![Tag::OctetString(OctetString {
            id: 0,
            class: TagClass::Context,
            inner: START_TLS_OID.as_bytes().to_vec(),
        })],
    });
    framed
        .send(OutMessage {
            id: 1,
            protocol_op: req,
            controls: Vec::new(),
        })
        .await?;

    let msg = framed
        .next()
        .await
        .ok_or_else(|| LdapError::Connection("StartTLS: connection closed".to_string()))??;
    let (result, _) = crate::message::parse_ldap_result(msg.protocol_op)?;
    result.success().map_err(|_| {
        LdapError::Connection("StartTLS: server declined the extended operation".to_string())
    })?;

    let stream = framed.into_inner();
    let mut builder = native_tls::TlsConnector::builder();
    if settings.no_tls_verify() {
        builder.danger_accept_invalid_certs(true);
        builder.danger_accept_invalid_hostnames(true);
    }
    let connector = builder
        .build()
        .map_err(|e| LdapError::Connection(format!("TLS setup failed: {e}")))?;
    let connector = tokio_native_tls::TlsConnector::from(connector);
    let tls_stream = connector
        .connect(host, stream)
        .await
        .map_err(|e| LdapError::Connection(format!("TLS handshake failed: {e}")))?;
    Ok(Transport::Tls(Box::new(tls_stream)))
}
