//! Script threads
//!
//! Each Amber program runs on its own worker thread with its own engine.
//! Only the source text and configuration cross the thread boundary; the
//! reactive objects are created and dropped inside the worker.

use crate::config::CompilerConfig;
use crate::error::Error;
use crate::run_source;
use std::io;
use std::thread::{self, JoinHandle};

/// Worker stack size. Listener chains unwind as nested calls.
pub const STACK_SIZE: usize = 16 * 1024 * 1024;

pub struct ScriptThread {
    name: String,
    source: String,
    config: CompilerConfig,
    scripts: Vec<String>,
    argument: Option<String>,
}

impl ScriptThread {
    pub fn new(name: impl Into<String>, source: impl Into<String>, config: CompilerConfig) -> Self {
        ScriptThread {
            name: name.into(),
            source: source.into(),
            config,
            scripts: Vec::new(),
            argument: None,
        }
    }

    /// Script evaluated after execution. Its result is part of the
    /// output of [`ScriptThread::run`].
    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.scripts.push(script.into());
        self
    }

    /// Script expression whose value is passed to every Init function.
    pub fn with_argument(mut self, expression: impl Into<String>) -> Self {
        self.argument = Some(expression.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parse, compile and execute on the calling thread, then evaluate
    /// the extra scripts. Returns the rendered result of each script.
    pub fn run(&self) -> Result<Vec<String>, Error> {
        let engine = self.config.create_engine();
        let argument = match &self.argument {
            Some(expression) => Some(engine.evaluate_script(expression)?),
            None => None,
        };
        let program = run_source(&self.source, &self.config, engine, argument.as_ref())?;
        if program.diagnostics.reported() > 0 {
            tracing::info!(
                "{}: {} observer errors",
                self.name,
                program.diagnostics.reported()
            );
        }

        let mut results = Vec::with_capacity(self.scripts.len());
        for script in &self.scripts {
            let value = program.engine.evaluate_script(script)?;
            results.push(value.describe());
        }
        Ok(results)
    }

    /// Run on a new thread. Results go to stdout, errors to stderr.
    pub fn spawn(self) -> io::Result<ScriptHandle> {
        let name = self.name.clone();
        let handle = thread::Builder::new()
            .name(name.clone())
            .stack_size(STACK_SIZE)
            .spawn(move || match self.run() {
                Ok(results) => {
                    for result in results {
                        println!("{}", result);
                    }
                    0
                }
                Err(e) => {
                    eprintln!("{}: {}", self.name, e);
                    1
                }
            })?;
        Ok(ScriptHandle { name, handle })
    }
}

pub struct ScriptHandle {
    name: String,
    handle: JoinHandle<i32>,
}

impl ScriptHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Exit status of the script. A panicked worker counts as failure.
    pub fn join(self) -> i32 {
        self.handle.join().unwrap_or_else(|_| {
            tracing::error!("script thread {} panicked", self.name);
            1
        })
    }
}
