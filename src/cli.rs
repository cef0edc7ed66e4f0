use std::path::{Component, Path, PathBuf};

use clap::Parser;

use crate::DEFAULT_BUFFER_SIZE;

#[derive(Parser, Debug)]
#[command(name = "seekbuf")]
#[command(version)]
#[command(about = "List and extract ZIP archives in one forward pass over stdin, files or HTTP", long_about = None)]
#[command(after_help = "Examples:\n  \
  curl -s https://example.com/a.zip | seekbuf -l -     list an archive arriving on a pipe\n  \
  seekbuf https://example.com/a.zip -x '*.log'         extract all files except logs\n  \
  seekbuf -p data.zip notes.txt | more                 send one file into more")]
pub struct Cli {
    /// ZIP file path, HTTP URL, or - for stdin
    #[arg(value_name = "SOURCE")]
    pub source: String,

    /// Files to extract (default: all)
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,

    /// List files (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Extract files to pipe, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<PathBuf>,

    /// Exclude files that follow
    #[arg(short = 'x', value_name = "FILE", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Never overwrite existing files
    #[arg(short = 'n')]
    pub never_overwrite: bool,

    /// Overwrite files WITHOUT prompting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Junk paths (do not make directories)
    #[arg(short = 'j')]
    pub junk_paths: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Bytes kept for seeking backward in the source
    #[arg(long, env = "SEEKBUF_BUFFER_SIZE", default_value_t = DEFAULT_BUFFER_SIZE)]
    pub buffer_size: usize,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    pub fn is_listing(&self) -> bool {
        self.list || self.verbose
    }

    /// Whether the entry named `name` is selected by the FILES and `-x` arguments.
    pub fn selects(&self, name: &str) -> bool {
        if !self.files.is_empty() {
            let requested = self.files.iter().any(|f| {
                if has_glob_chars(f) {
                    glob_match(f, name)
                } else {
                    name == f || base_name(name) == f
                }
            });
            if !requested {
                return false;
            }
        }

        !self
            .exclude
            .iter()
            .any(|x| name.contains(x.as_str()) || glob_match(x, name))
    }

    /// Where an entry named `name` is written, or `None` if the name would
    /// escape the output directory.
    pub fn output_path(&self, name: &str) -> Option<PathBuf> {
        let relative = if self.junk_paths {
            PathBuf::from(base_name(name))
        } else {
            sanitized(name)?
        };
        if relative.as_os_str().is_empty() {
            return None;
        }

        Some(match &self.extract_dir {
            Some(dir) => dir.join(relative),
            None => relative,
        })
    }
}

fn base_name(name: &str) -> &str {
    name.trim_end_matches('/').rsplit('/').next().unwrap_or(name)
}

/// Rejects absolute names and `..` components.
fn sanitized(name: &str) -> Option<PathBuf> {
    let mut path = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(path)
}

fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Glob matching with `*` (any run of characters) and `?` (one character).
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    // backtrack to the most recent star on a mismatch
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some((p, t));
                p += 1;
            }
            Some('?') => {
                p += 1;
                t += 1;
            }
            Some(c) if *c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some((sp, st)) => {
                    p = sp + 1;
                    t = st + 1;
                    star = Some((sp, st + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|c| *c == '*')
}
