//! Redis preset speaking RESP directly over a TCP stream.

use log::debug;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::container_management::types::ContainerHandle;
use crate::error_handling::types::{InitError, ProbeError};
use crate::preset_management::context::Context;
use crate::preset_management::options::{health_check, init, PresetOption, StartOption};
use crate::preset_management::preset::Preset;
use crate::preset_management::seeding::{bounded_attempt, seed_values};
use crate::preset_management::settings::{PresetSettings, DEFAULT_VERSION};
use crate::preset_management::types::{NamedPorts, SeedValues};

pub const NAME: &str = "redis";
const REPOSITORY: &str = "redis";
const SERVER_PORT: u16 = 6379;
const OPERATION_TIMEOUT: Duration = Duration::from_secs(2);
const HEALTH_KEY: &str = "dockside_health";
/// Largest bulk string redis accepts (512 MiB).
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

pub fn preset(options: Vec<PresetOption>) -> RedisPreset {
    let mut preset = RedisPreset::default();
    preset.apply(options);
    preset
}

#[derive(Debug, Clone, Default)]
pub struct RedisPreset {
    settings: PresetSettings,
}

impl RedisPreset {
    /// Reads `key` back from the redis listening on `addr`.
    pub async fn get(addr: &str, key: &str) -> Result<Option<String>, ProbeError> {
        match command(addr, &["GET", key]).await? {
            Reply::Bulk(value) => Ok(value),
            other => Err(unexpected("GET", &other)),
        }
    }
}

impl Preset for RedisPreset {
    fn name(&self) -> &str {
        NAME
    }

    fn image(&self) -> String {
        self.settings.image(REPOSITORY)
    }

    fn ports(&self) -> NamedPorts {
        NamedPorts::default_tcp(SERVER_PORT)
    }

    fn options(&mut self) -> Vec<StartOption> {
        self.apply_defaults();

        let mut options = vec![health_check(healthcheck)];
        if let Some(values) = self.settings.seeds() {
            let values = values.clone();
            options.push(init(move |ctx, container| {
                let values = values.clone();
                async move { load_values(ctx, container, values).await }
            }));
        }
        options
    }

    fn configure(&mut self, option: PresetOption) {
        self.settings.apply(option)
    }

    fn apply_defaults(&mut self) {
        self.settings.apply_defaults(DEFAULT_VERSION)
    }
}

#[derive(Debug, PartialEq)]
enum Reply {
    Simple(String),
    Integer(i64),
    Bulk(Option<String>),
}

fn unexpected(op: &str, reply: &Reply) -> ProbeError {
    ProbeError::Operation {
        op: op.to_string(),
        detail: format!("unexpected reply {:?}", reply),
    }
}

fn encode(args: &[&str]) -> Vec<u8> {
    let mut buf = format!("*{}\r\n", args.len()).into_bytes();
    for arg in args {
        buf.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        buf.extend_from_slice(arg.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
    buf
}

/// Sends one command on a fresh connection and reads its reply.
async fn command(addr: &str, args: &[&str]) -> Result<Reply, ProbeError> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|e| ProbeError::Connection(format!("{}: {}", addr, e)))?;
    exchange(stream, args).await
}

async fn exchange<S>(stream: S, args: &[&str]) -> Result<Reply, ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let op = args.first().copied().unwrap_or_default();
    let io_err = |e: std::io::Error| ProbeError::Operation {
        op: op.to_string(),
        detail: e.to_string(),
    };

    let mut reader = BufReader::new(stream);
    reader
        .get_mut()
        .write_all(&encode(args))
        .await
        .map_err(io_err)?;

    let mut line = String::new();
    if reader.read_line(&mut line).await.map_err(io_err)? == 0 {
        return Err(ProbeError::Operation {
            op: op.to_string(),
            detail: "connection closed before reply".to_string(),
        });
    }
    let line = line.trim_end_matches("\r\n");
    let Some(kind) = line.chars().next() else {
        return Err(ProbeError::Operation {
            op: op.to_string(),
            detail: "empty reply".to_string(),
        });
    };
    let rest = &line[kind.len_utf8()..];

    match kind {
        '+' => Ok(Reply::Simple(rest.to_string())),
        '-' => Err(ProbeError::Operation {
            op: op.to_string(),
            detail: rest.to_string(),
        }),
        ':' => rest
            .parse()
            .map(Reply::Integer)
            .map_err(|_| ProbeError::Operation {
                op: op.to_string(),
                detail: format!("invalid integer reply {:?}", rest),
            }),
        '$' => {
            let len: i64 = rest.parse().map_err(|_| ProbeError::Operation {
                op: op.to_string(),
                detail: format!("invalid bulk length {:?}", rest),
            })?;
            if len < 0 {
                return Ok(Reply::Bulk(None));
            }
            if len > MAX_BULK_LEN {
                return Err(ProbeError::Operation {
                    op: op.to_string(),
                    detail: format!("bulk length {} exceeds {}", len, MAX_BULK_LEN),
                });
            }
            let mut data = vec![0u8; len as usize + 2];
            reader.read_exact(&mut data).await.map_err(io_err)?;
            data.truncate(len as usize);
            Ok(Reply::Bulk(Some(String::from_utf8_lossy(&data).into_owned())))
        }
        _ => Err(ProbeError::Operation {
            op: op.to_string(),
            detail: format!("unsupported reply {:?}", line),
        }),
    }
}

async fn set(addr: &str, key: &str, value: &str) -> Result<(), ProbeError> {
    match command(addr, &["SET", key, value]).await? {
        Reply::Simple(ok) if ok == "OK" => Ok(()),
        other => Err(unexpected("SET", &other)),
    }
}

async fn healthcheck(ctx: Context, container: ContainerHandle) -> Result<(), ProbeError> {
    let addr = container.default_address()?;
    debug!("Probing redis at {}", addr);
    bounded_attempt(&ctx, OPERATION_TIMEOUT, set(&addr, HEALTH_KEY, "ok")).await
}

async fn load_values(
    ctx: Context,
    container: ContainerHandle,
    values: SeedValues,
) -> Result<(), InitError> {
    seed_values(&ctx, &values, OPERATION_TIMEOUT, |key, value| {
        let container = container.clone();
        async move {
            let addr = container.default_address()?;
            set(&addr, &key, &value).await
        }
    })
    .await
}
