//! Shared helpers for integration tests

#![allow(dead_code)]

use packscout::{ReleaseMetadata, Shell};
use std::path::PathBuf;

pub const JX_DESCRIPTION: &str =
    "A tool to install and interact with Jenkins X on your Kubernetes cluster.";
pub const JX_URL_TEMPLATE: &str =
    "https://github.com/jenkins-x/jx/releases/download/v{{version}}/jx-darwin-amd64.tar.gz";
pub const JX_1_0_1_SHA256: &str =
    "e3b1a9c6d5f0a2b47c8e9d1f3a5b7c9e0f2a4b6c8d0e1f3a5b7c9d1e3f5a7b9c";
pub const JX_1_0_2_SHA256: &str =
    "5f2c8a1e7b3d9f4a6c0e2b8d4f6a1c3e5b7d9f0a2c4e6b8d1f3a5c7e9b0d2f4a";

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

pub fn project_fixture(name: &str) -> PathBuf {
    fixtures_dir().join("projects").join(name)
}

pub fn formula_fixture(kind: &str) -> PathBuf {
    fixtures_dir().join("formula").join(kind).join("jx.rb")
}

/// Path to the packscout binary built for this test run
pub fn packscout_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_packscout"))
}

/// Release metadata matching the formula fixtures.
pub fn jx_metadata(version: &str, checksum: &str) -> ReleaseMetadata {
    ReleaseMetadata::new("jx", version, JX_URL_TEMPLATE, checksum)
        .with_field("description", JX_DESCRIPTION)
        .with_field("homepage", "https://jenkins-x.io/")
        .with_shell(Shell::Zsh)
        .with_shell(Shell::Bash)
}
