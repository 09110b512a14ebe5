//! Output sink for `console.log`.

use std::cell::RefCell;

pub trait Console {
    fn log(&self, line: &str);
}

/// Writes each line to standard output.
pub struct StdoutConsole;

impl Console for StdoutConsole {
    fn log(&self, line: &str) {
        println!("{}", line);
    }
}

/// Collects lines in memory.
#[derive(Default)]
pub struct BufferConsole {
    lines: RefCell<Vec<String>>,
}

impl BufferConsole {
    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }
}

impl Console for BufferConsole {
    fn log(&self, line: &str) {
        self.lines.borrow_mut().push(line.to_string());
    }
}
