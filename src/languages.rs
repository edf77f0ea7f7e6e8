use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// The closed set of languages the engine can judge
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Cpp,
    C,
    Java,
}

impl Language {
    /// Resolves a language tag to a known language, `None` for unsupported tags
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "python" => Some(Self::Python),
            "cpp" => Some(Self::Cpp),
            "c" => Some(Self::C),
            "java" => Some(Self::Java),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Cpp => "cpp",
            Self::C => "c",
            Self::Java => "java",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Per-language description of how to materialize, compile and run source code
///
/// Profiles are immutable and defined once per supported language. Command
/// templates use `%SOURCE%` and `%CLASS%` placeholders which are
/// substituted at execution time. All paths are relative to the working
/// directory so the same command works in a container and as a local process.
#[derive(Debug)]
pub struct ToolchainProfile {
    pub language: Language,
    /// Source filename template, `%CLASS%` substituted for Java
    pub source_file: &'static str,
    pub compiled: bool,
    /// Compiler command template, absent for interpreted languages
    pub compile_command: Option<&'static [&'static str]>,
    /// Run command template
    pub run_command: &'static [&'static str],
    /// Container image used for the compile step (hardened mode)
    pub compile_image: &'static str,
    /// Container image used for the run step (hardened mode)
    pub run_image: &'static str,
}

const PYTHON_PROFILE: ToolchainProfile = ToolchainProfile {
    language: Language::Python,
    source_file: "solution.py",
    compiled: false,
    compile_command: None,
    run_command: &["python3", "solution.py"],
    compile_image: "python:3.11-slim",
    run_image: "python:3.11-slim",
};

const CPP_PROFILE: ToolchainProfile = ToolchainProfile {
    language: Language::Cpp,
    source_file: "solution.cpp",
    compiled: true,
    compile_command: Some(&["g++", "-std=c++14", "-O2", "-o", "solution", "%SOURCE%"]),
    run_command: &["./solution"],
    compile_image: "gcc:latest",
    run_image: "gcc:latest",
};

const C_PROFILE: ToolchainProfile = ToolchainProfile {
    language: Language::C,
    source_file: "solution.c",
    compiled: true,
    compile_command: Some(&["gcc", "-O2", "-o", "solution", "%SOURCE%"]),
    run_command: &["./solution"],
    compile_image: "gcc:latest",
    run_image: "gcc:latest",
};

const JAVA_PROFILE: ToolchainProfile = ToolchainProfile {
    language: Language::Java,
    source_file: "%CLASS%.java",
    compiled: true,
    compile_command: Some(&["javac", "%SOURCE%"]),
    run_command: &["java", "%CLASS%"],
    compile_image: "openjdk:17-jdk-slim",
    run_image: "openjdk:17-jdk-slim",
};

/// Looks up the toolchain profile for a language
pub fn profile(language: Language) -> &'static ToolchainProfile {
    match language {
        Language::Python => &PYTHON_PROFILE,
        Language::Cpp => &CPP_PROFILE,
        Language::C => &C_PROFILE,
        Language::Java => &JAVA_PROFILE,
    }
}

impl ToolchainProfile {
    /// The concrete source filename for a submission
    pub fn source_file_name(&self, class_name: &str) -> String {
        self.source_file.replace("%CLASS%", class_name)
    }

    /// The concrete compile command, if this profile compiles at all
    pub fn resolved_compile_command(&self, class_name: &str) -> Option<Vec<String>> {
        let source = self.source_file_name(class_name);
        self.compile_command
            .map(|template| apply_template(template, &source, class_name))
    }

    /// The concrete run command
    pub fn resolved_run_command(&self, class_name: &str) -> Vec<String> {
        let source = self.source_file_name(class_name);
        apply_template(self.run_command, &source, class_name)
    }
}

/// Applies placeholder substitutions to a command template
fn apply_template(template: &[&str], source: &str, class_name: &str) -> Vec<String> {
    let mut mapping = HashMap::<&str, &str>::new();
    mapping.insert("%SOURCE%", source);
    mapping.insert("%CLASS%", class_name);

    template
        .iter()
        .map(|s| {
            let mut t = s.to_string();
            for (k, v) in mapping.iter() {
                t = t.replace(k, v);
            }
            t
        })
        .collect()
}

/// Locates the externally visible class name in Java source code
///
/// The first `class X` declaration decides the expected source filename and
/// the name passed to `java`. `None` means the source has no recognizable
/// class declaration and cannot be compiled.
pub fn java_class_name(code: &str) -> Option<String> {
    static JAVA_CLASS: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"class\s+(\w+)").expect("valid class pattern"));

    JAVA_CLASS.captures(code).map(|c| c[1].to_string())
}

/// Expands the `bits/stdc++.h` convenience header into explicit includes
///
/// The header only exists on GNU toolchains; expanding it keeps submissions
/// portable across compilers. This is a pure text substitution applied before
/// the compile step.
pub fn expand_cpp_includes(code: &str) -> String {
    const CONVENIENCE_HEADER: &str = "#include<bits/stdc++.h>";
    const EXPLICIT_INCLUDES: &str = concat!(
        "#include <iostream>\n",
        "#include <vector>\n",
        "#include <string>\n",
        "#include <algorithm>\n",
        "#include <map>\n",
        "#include <set>\n",
        "#include <queue>\n",
        "#include <stack>\n",
        "#include <cmath>\n",
        "#include <cstring>\n",
        "#include <cstdio>\n",
        "#include <cstdlib>\n",
        "#include <climits>\n",
        "#include <cassert>\n",
        "#include <numeric>\n",
        "#include <unordered_map>\n",
        "#include <unordered_set>\n",
        "#include <bitset>\n",
        "#include <limits>\n",
    );

    if code.contains(CONVENIENCE_HEADER) {
        code.replace(CONVENIENCE_HEADER, EXPLICIT_INCLUDES)
    } else {
        code.to_string()
    }
}
