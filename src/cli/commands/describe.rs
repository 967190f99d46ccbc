//! Describe command implementation.

use super::classify::parse_op;
use crate::request::auth::Id;
use crate::request::payload::{self, RequestPayload};
use crate::request::Request;
use anyhow::{Context, Result};
use clap::Args;

/// Build a request from flags and print its diagnostic line.
#[derive(Args, Debug)]
pub struct DescribeArgs {
    /// Session id (decimal or 0x-prefixed hex).
    #[arg(long, default_value = "0")]
    pub session_id: String,

    /// Client exchange id.
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub cxid: i32,

    /// Operation name or integer code.
    #[arg(long, allow_hyphen_values = true)]
    pub op: String,

    /// Payload as hex bytes.
    #[arg(long, conflicts_with = "path")]
    pub payload_hex: Option<String>,

    /// Build a path-first payload for this path.
    #[arg(long)]
    pub path: Option<String>,

    /// Authenticated identity as scheme:id (repeatable).
    #[arg(long = "auth")]
    pub auth: Vec<String>,
}

/// Run the describe command.
pub fn run_describe(args: DescribeArgs) -> Result<()> {
    let request = build_request(&args)?;
    println!("{}", request.describe());
    println!("payload: {}", request.payload_digest_hex());
    if let Some(users) = request.audit_users() {
        println!("users: {}", users);
    }
    Ok(())
}

fn build_request(args: &DescribeArgs) -> Result<Request> {
    let session_id = parse_session_id(&args.session_id)?;
    let op_type = parse_op(&args.op)?;

    let payload = match (&args.payload_hex, &args.path) {
        (Some(hex_bytes), _) => Some(RequestPayload::new(
            hex::decode(hex_bytes.trim()).context("payload is not valid hex")?,
        )),
        (None, Some(path)) => Some(RequestPayload::new(payload::encode_path(path))),
        (None, None) => None,
    };

    let auth_info = args
        .auth
        .iter()
        .map(|entry| match entry.split_once(':') {
            Some((scheme, id)) => Ok(Id::new(scheme, id)),
            None => anyhow::bail!("auth entry must be scheme:id, got {}", entry),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Request::from_client(
        None,
        session_id,
        args.cxid,
        op_type,
        payload,
        auth_info,
    ))
}

fn parse_session_id(value: &str) -> Result<i64> {
    match value.strip_prefix("0x") {
        Some(hex_digits) => u64::from_str_radix(hex_digits, 16)
            .map(|v| v as i64)
            .with_context(|| format!("invalid hex session id: {}", value)),
        None => value
            .parse::<i64>()
            .with_context(|| format!("invalid session id: {}", value)),
    }
}
