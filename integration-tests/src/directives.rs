// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `// fake: <key> <value>` directives embedded in test sources.
//!
//! The fake compiler copies directive lines from each source file into the assembly artifact it
//! produces, the fake assembler copies them into the object file, and the fake linker turns them
//! into a shell script. Supported keys:
//!
//! * `compile-exit N`: the compiler exits with `N` without producing artifacts. Only read from
//!   the entry file.
//! * `assemble-exit N`: the assembler exits with `N` for the artifact.
//! * `link-exit N`: the linker exits with `N`.
//! * `exit N`: the executable exits with `N`.
//! * `stdout TEXT`: the executable prints `TEXT` on its own line. May be repeated.

/// The prefix marking a directive line.
pub const PREFIX: &str = "// fake:";

/// The directory, relative to the current directory, the fake compiler writes artifacts into.
pub const COMPILER_OUTPUT_DIR: &str = "output";

/// Directives gathered from one or more files.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Directives {
    /// Exit code for the compiler.
    pub compile_exit: Option<i32>,

    /// Exit code for the assembler.
    pub assemble_exit: Option<i32>,

    /// Exit code for the linker.
    pub link_exit: Option<i32>,

    /// Exit code for the produced executable.
    pub exit: Option<i32>,

    /// Lines printed by the produced executable.
    pub stdout: Vec<String>,
}

impl Directives {
    /// Parses every directive line in `text`. Unknown keys and malformed values are ignored.
    pub fn parse(text: &str) -> Self {
        let mut directives = Self::default();
        for (key, value) in directive_lines(text).filter_map(split_directive) {
            match key {
                "compile-exit" => directives.compile_exit = value.parse().ok(),
                "assemble-exit" => directives.assemble_exit = value.parse().ok(),
                "link-exit" => directives.link_exit = value.parse().ok(),
                "exit" => directives.exit = value.parse().ok(),
                "stdout" => directives.stdout.push(value.to_owned()),
                _ => {}
            }
        }
        directives
    }

    /// Merges `other` into `self`. Exit codes already set are kept.
    pub fn merge(&mut self, other: Directives) {
        self.compile_exit = self.compile_exit.or(other.compile_exit);
        self.assemble_exit = self.assemble_exit.or(other.assemble_exit);
        self.link_exit = self.link_exit.or(other.link_exit);
        self.exit = self.exit.or(other.exit);
        self.stdout.extend(other.stdout);
    }

    /// Renders the executable described by these directives as a shell script.
    pub fn to_script(&self) -> String {
        let mut script = String::from("#!/bin/sh\n");
        for line in &self.stdout {
            script.push_str("printf '%s\\n' ");
            script.push_str(&shell_words::quote(line));
            script.push('\n');
        }
        script.push_str("exit ");
        script.push_str(&self.exit.unwrap_or(0).to_string());
        script.push('\n');
        script
    }
}

/// Returns the directive lines of `text`, without surrounding whitespace.
pub fn directive_lines(text: &str) -> impl Iterator<Item = &str> + '_ {
    text.lines()
        .map(str::trim)
        .filter(|line| line.starts_with(PREFIX))
}

/// Returns the directive lines of `text`, one per line.
pub fn extract_directives(text: &str) -> String {
    let mut out = String::new();
    for line in directive_lines(text) {
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn split_directive(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix(PREFIX)?.trim();
    match rest.split_once(char::is_whitespace) {
        Some((key, value)) => Some((key, value.trim())),
        None => Some((rest, "")),
    }
}
