//! Shared test infrastructure for integration tests.

use signup_relay::record::{RegistrationRecord, Role};
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Runs the `signup` binary with its data dir and mirror isolated in a temp dir.
#[allow(dead_code)]
pub struct CliFixture {
    pub root: TempDir,
    envs: Vec<(String, String)>,
}

#[allow(dead_code)]
impl CliFixture {
    pub fn isolated() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        Self {
            root,
            envs: Vec::new(),
        }
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.envs.push((key.to_string(), value.to_string()));
        self
    }

    pub fn mirror_path(&self) -> PathBuf {
        self.root.path().join("mirror.json")
    }

    pub fn seed_mirror(&self, records: &[RegistrationRecord]) {
        let bytes = serde_json::to_vec_pretty(records).expect("serialize records");
        std::fs::write(self.mirror_path(), bytes).expect("write mirror");
    }

    pub fn mirrored(&self) -> Vec<RegistrationRecord> {
        let bytes = std::fs::read(self.mirror_path()).expect("read mirror");
        serde_json::from_slice(&bytes).expect("parse mirror")
    }

    pub fn run(&self, args: &[&str]) -> Output {
        let home = self.root.path();
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_signup"));
        cmd.args(args)
            .env("HOME", home)
            .env("XDG_DATA_HOME", home.join("data"))
            .env("SIGNUP_MIRROR_PATH", self.mirror_path())
            .env("SIGNUP_LOG", "warn")
            .env_remove("SIGNUP_BACKEND_URL")
            .env_remove("SIGNUP_ADMIN_USERNAME")
            .env_remove("SIGNUP_ADMIN_PASSWORD");
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        cmd.output().expect("run signup binary")
    }
}

#[allow(dead_code)]
pub fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[allow(dead_code)]
pub fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Base URL of a local port with nothing listening on it.
pub fn closed_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind probe port");
    let addr = listener.local_addr().expect("probe port address");
    drop(listener);
    format!("http://{addr}")
}

pub fn sample_record(id: &str, name: &str, date: &str) -> RegistrationRecord {
    RegistrationRecord {
        id: id.to_string(),
        full_name: name.to_string(),
        phone_number: "+91 9876543210".to_string(),
        email: format!("{}@example.org", name.to_lowercase().replace(' ', ".")),
        user_type: Role::Parent,
        reason: "Stay updated with technology trends".to_string(),
        preferred_date: date.to_string(),
        signup_timestamp: "2026-10-16T09:30:00.000Z".to_string(),
    }
}
