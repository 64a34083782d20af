// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `devshell init` command.

use clap::Args;
use miette::Result;
use std::path::PathBuf;

use devshell::Platform;

/// Create a new .devshell.yaml file
#[derive(Debug, Args)]
pub struct CmdInit {
    /// Directory to create file in
    #[clap(default_value = ".")]
    path: PathBuf,

    /// Enable in-tree inheritance
    #[clap(long)]
    inherit: bool,

    /// Add an initial tool to the shell
    #[clap(long = "tool")]
    tools: Vec<String>,

    /// Template to use: minimal, standard, full
    #[clap(long, default_value = "standard")]
    template: String,
}

impl CmdInit {
    pub async fn run(&mut self) -> Result<i32> {
        let spec_path = self.path.join(devshell::DEVSHELL_FILENAME);

        // Check if file already exists
        if spec_path.exists() {
            return Err(miette::miette!(
                ".devshell.yaml already exists at {:?}",
                spec_path
            ));
        }

        // Generate template based on option
        let content = match self.template.as_str() {
            "minimal" => self.generate_minimal_template(),
            "full" => self.generate_full_template(),
            _ => self.generate_standard_template(),
        };

        // Refuse to write a file that would not load
        devshell::DevSpec::from_yaml(content.as_str())?;

        // Write file
        std::fs::write(&spec_path, content)
            .map_err(|e| miette::miette!("Failed to write .devshell.yaml: {}", e))?;

        println!("Created .devshell.yaml at {:?}", spec_path);
        println!();
        println!("Next steps:");
        println!("  1. Declare your sources and packages");
        println!("  2. Run 'devshell show' to review the configuration");
        println!("  3. Run 'devshell shell' to enter the shell");

        Ok(0)
    }

    fn tools_list(&self) -> String {
        format!("[{}]", self.tools.join(", "))
    }

    fn generate_minimal_template(&self) -> String {
        format!(
            "api: devshell/v0\n\
            inherit: {}\n\
            \n\
            shell:\n\
            \x20 tools: {}\n",
            self.inherit,
            self.tools_list()
        )
    }

    fn generate_standard_template(&self) -> String {
        format!(
            "# devshell shell specification\n\
            \n\
            api: devshell/v0\n\
            \n\
            # Optional: Human-readable description\n\
            # description: \"My project shell\"\n\
            \n\
            # In-tree inheritance (default: false)\n\
            # When true, walks up directory tree loading parent .devshell.yaml files\n\
            inherit: {}\n\
            \n\
            # Platforms to evaluate the shell for (default: the host)\n\
            # platforms: [x86_64-linux, aarch64-darwin]\n\
            \n\
            # Package sources, each pinned to an exact revision\n\
            # sources:\n\
            #   pkgs: {{ url: \"https://github.com/example/pkgs\", rev: \"a1b2c3\" }}\n\
            \n\
            # base:\n\
            #   source: pkgs\n\
            #   packages:\n\
            #     openssl: \"3.0.13\"\n\
            \n\
            shell:\n\
            \x20 tools: {}\n\
            \x20 # link_deps: [openssl]\n\
            \x20 # environment:\n\
            \x20 #   - set: OPENSSL_DIR\n\
            \x20 #     value: \"${{pkgs.openssl}}\"\n",
            self.inherit,
            self.tools_list(),
        )
    }

    fn generate_full_template(&self) -> String {
        let platforms: Vec<_> = Platform::all().iter().map(|p| p.to_string()).collect();
        format!(
            "# devshell shell specification\n\
            # Full example with all fields documented\n\
            \n\
            api: devshell/v0\n\
            \n\
            description: \"Full example shell\"\n\
            \n\
            inherit: {}\n\
            \n\
            # includes:\n\
            #   - ~/.config/devshell/defaults.devshell.yaml\n\
            #   - ../shared/common.devshell.yaml\n\
            \n\
            # store_dir: /devshell/store\n\
            \n\
            platforms: [{}]\n\
            # default_platform: x86_64-linux\n\
            \n\
            sources: {{}}\n\
            #   pkgs: {{ url: \"https://github.com/example/pkgs\", rev: \"a1b2c3\" }}\n\
            #   rust-overlay: {{ url: \"https://github.com/example/rust-overlay\", rev: \"d4e5f6\" }}\n\
            \n\
            # toolchain:\n\
            #   file: rust-toolchain.toml\n\
            #   package: rust-toolchain\n\
            #   source: rust-overlay\n\
            \n\
            base: {{}}\n\
            #   source: pkgs\n\
            #   packages:\n\
            #     openssl: \"3.0.13\"\n\
            #     pkg-config: {{ version: \"0.29.2\" }}\n\
            \n\
            overlays: []\n\
            #   - name: pins\n\
            #     packages:\n\
            #       openssl: {{ from: prev.openssl, version: \"3.1.4\" }}\n\
            #       darwin-only: {{ version: \"1\", platforms: [aarch64-darwin] }}\n\
            \n\
            shell:\n\
            \x20 tools: {}\n\
            \x20 # link_deps: [openssl]\n\
            \x20 # library_path_var: LD_LIBRARY_PATH\n\
            \x20 # environment:\n\
            \x20 #   - set: OPENSSL_DIR\n\
            \x20 #     value: \"${{pkgs.openssl}}\"\n\
            \x20 #   - prepend: PKG_CONFIG_PATH\n\
            \x20 #     value: \"${{pkgs.openssl.lib}}/pkgconfig\"\n",
            self.inherit,
            platforms.join(", "),
            self.tools_list(),
        )
    }
}

#[cfg(test)]
#[path = "./cmd_init_test.rs"]
mod cmd_init_test;
