//! Fake build tools for pipeline scenario tests
//!
//! [`FakeTools`] answers every command with a scripted exit code and mimics
//! the side effects the pipeline relies on: `curl` writes the manifest,
//! `vcs import` can create the bridge package, and the build tool fills the
//! install space.

#![allow(dead_code)]

use ros2_batch::executor::{
    CommandOutput, CommandRunner, HostShell, ProcessSpawner, ProcessSpec,
};
use ros2_batch::pipeline::PipelineError;
use ros2_batch::pipeline::packaging::IGNORE_MARKER;
use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

pub const MANIFEST: &str = "repositories:\n  ros2/rclcpp:\n    type: git\n    url: https://github.com/ros2/rclcpp.git\n    version: master\n";

pub const INSTALLED: &[&str] = &[
    "talker",
    "listener__rmw_fastrtps_cpp",
    "simple_bridge_1_to_2",
    "static_bridge",
    "dynamic_bridge",
];

#[derive(Clone, Default)]
pub struct FakeTools {
    pub calls: Rc<RefCell<Vec<ProcessSpec>>>,
    /// For every main package build: was the bridge masked at that moment
    pub bridge_masked: Rc<RefCell<Vec<bool>>>,
    failures: Vec<(String, i32)>,
    bridge: bool,
    source: String,
    install: String,
}

impl FakeTools {
    pub fn new() -> Self {
        Self {
            source: "src".to_string(),
            install: "install".to_string(),
            ..Self::default()
        }
    }

    /// Commands whose line contains `needle` exit with `code`
    pub fn fail_when(mut self, needle: &str, code: i32) -> Self {
        self.failures.push((needle.to_string(), code));
        self
    }

    /// `vcs import` also checks out the bridge package
    pub fn with_bridge(mut self) -> Self {
        self.bridge = true;
        self
    }

    pub fn with_spaces(mut self, source: &str, install: &str) -> Self {
        self.source = source.to_string();
        self.install = install.to_string();
        self
    }

    pub fn runner(&self) -> CommandRunner {
        CommandRunner::new(Box::new(self.clone())).with_shell(HostShell::Posix)
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|s| s.command_line.clone())
            .collect()
    }

    pub fn ran(&self, needle: &str) -> bool {
        self.command_lines().iter().any(|l| l.contains(needle))
    }

    fn bridge_dir(&self, cwd: &Path) -> std::path::PathBuf {
        cwd.join(&self.source).join("ros2").join("ros1_bridge")
    }

    fn side_effects(&self, spec: &ProcessSpec) -> std::io::Result<()> {
        let line = &spec.command_line;
        let cwd = &spec.current_dir;
        if line.contains("curl ") {
            fs::write(cwd.join("ros2.repos"), MANIFEST)?;
        } else if line.contains("vcs import") && self.bridge {
            fs::create_dir_all(self.bridge_dir(cwd))?;
        } else if line.contains("ament.py") && line.contains(" build ") {
            if !line.contains("--only") {
                self.bridge_masked
                    .borrow_mut()
                    .push(self.bridge_dir(cwd).join(IGNORE_MARKER).exists());
            }
            let bin = cwd.join(&self.install).join("bin");
            fs::create_dir_all(&bin)?;
            for name in INSTALLED {
                fs::write(bin.join(name), "#!/bin/sh\n")?;
            }
        }
        Ok(())
    }
}

impl ProcessSpawner for FakeTools {
    fn spawn(&mut self, spec: &ProcessSpec) -> Result<CommandOutput, PipelineError> {
        self.calls.borrow_mut().push(spec.clone());
        let exit_code = self
            .failures
            .iter()
            .find(|(needle, _)| spec.command_line.contains(needle.as_str()))
            .map_or(0, |(_, code)| *code);
        if exit_code == 0 {
            self.side_effects(spec)?;
        }
        Ok(CommandOutput {
            exit_code,
            ..CommandOutput::default()
        })
    }
}
