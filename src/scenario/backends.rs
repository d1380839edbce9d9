use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// In-process queue and a local directory for blobs.
    #[clap(name = "dry-run")]
    DryRun,
    /// SQS and S3.
    Aws,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DryRun => write!(f, "dry-run"),
            Self::Aws => write!(f, "aws"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dry-run" | "dryrun" | "local" => Ok(Self::DryRun),
            "aws" => Ok(Self::Aws),
            other => Err(anyhow!("unknown backend kind: {other}")),
        }
    }
}
