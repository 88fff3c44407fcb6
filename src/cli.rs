//! Command-line surface: `squall [-s|--shader PATH]… [-h|--help]`.
//! Each `-s` stacks one post-process shader pass, applied in the order
//! given. Paths are resolved relative to the installation root first, then
//! as-is, by `config::resolve_relative_to_root` once the root is known.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "squall", about = "A GPU-accelerated terminal emulator")]
pub struct Cli {
    /// Stack a WGSL post-process shader pass (repeatable; applied in order).
    #[arg(short = 's', long = "shader", value_name = "PATH")]
    pub shaders: Vec<PathBuf>,

    /// Override the config file's shell command.
    #[arg(long)]
    pub shell: Option<String>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_shader_flags_stack_in_order() {
        let cli = Cli::parse_from(["squall", "-s", "a.wgsl", "-s", "b.wgsl"]);
        assert_eq!(cli.shaders, vec![PathBuf::from("a.wgsl"), PathBuf::from("b.wgsl")]);
    }

    #[test]
    fn no_shader_flags_yields_empty_chain() {
        let cli = Cli::parse_from(["squall"]);
        assert!(cli.shaders.is_empty());
    }

    #[test]
    fn long_form_shader_flag_is_accepted() {
        let cli = Cli::parse_from(["squall", "--shader", "crt.wgsl"]);
        assert_eq!(cli.shaders, vec![PathBuf::from("crt.wgsl")]);
    }
}
