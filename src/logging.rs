use env_logger::{Builder, Target};
use fs_err::{create_dir_all, OpenOptions};
use log::{warn, LevelFilter};
use std::io::{self, Write};
use std::path::Path;

/// Writer that copies everything written to it into two sinks.
pub struct Tee<A, B> {
    first: A,
    second: B,
}

impl<A: Write, B: Write> Tee<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.first.write_all(buf)?;
        self.second.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.first.flush()?;
        self.second.flush()
    }
}

/// Installs the global logger, writing to stderr and appending to `log_path`.
///
/// `RUST_LOG` directives refine `level`. When the log file cannot be opened
/// the logger writes to stderr only.
pub fn init(level: LevelFilter, log_path: &Path) {
    let mut builder = Builder::new();
    builder.filter_level(level).parse_default_env();

    match open_log_file(log_path) {
        Ok(file) => {
            builder
                .target(Target::Pipe(Box::new(Tee::new(io::stderr(), file))))
                .init();
        }
        Err(e) => {
            builder.init();
            warn!("Logging to stderr only, cannot open {}: {}", log_path.display(), e);
        }
    }
}

fn open_log_file(path: &Path) -> io::Result<fs_err::File> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
