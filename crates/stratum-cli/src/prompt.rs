//! Line-based terminal prompter.

use std::cell::RefCell;
use std::io::{self, BufRead, Write};

use stratum_upgrade::Prompter;

/// Asks questions on `output` and reads answers from `input`, one per line.
pub struct LinePrompter<R, W> {
    io: RefCell<(R, W)>,
}

impl LinePrompter<io::StdinLock<'static>, io::Stderr> {
    /// Prompts on stderr so stdout stays clean for results.
    pub fn stdio() -> Self {
        LinePrompter::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> LinePrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        LinePrompter {
            io: RefCell::new((input, output)),
        }
    }

    /// Prints `prompt` and reads one trimmed line. `None` at end of input.
    fn ask(&self, prompt: &str) -> io::Result<Option<String>> {
        let mut io = self.io.borrow_mut();
        let (input, output) = &mut *io;
        write!(output, "{} ", prompt)?;
        output.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn say(&self, text: &str) -> io::Result<()> {
        let mut io = self.io.borrow_mut();
        writeln!(io.1, "{}", text)
    }
}

impl<R: BufRead, W: Write> Prompter for LinePrompter<R, W> {
    fn confirm(&self, question: &str) -> io::Result<bool> {
        loop {
            let Some(answer) = self.ask(&format!("{} [y/n]", question))? else {
                return Ok(false);
            };
            match answer.to_ascii_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => self.say("please answer y or n")?,
            }
        }
    }

    fn select_one(&self, question: &str, options: &[String]) -> io::Result<Option<String>> {
        if options.is_empty() {
            return Ok(None);
        }
        self.say(question)?;
        for (i, option) in options.iter().enumerate() {
            self.say(&format!("  {}) {}", i + 1, option))?;
        }
        loop {
            let Some(answer) = self.ask(&format!("choose 1-{}:", options.len()))? else {
                return Ok(None);
            };
            if let Some(option) = options.iter().find(|o| **o == answer) {
                return Ok(Some(option.clone()));
            }
            match answer.parse::<usize>() {
                Ok(n) if (1..=options.len()).contains(&n) => return Ok(Some(options[n - 1].clone())),
                _ => self.say("not one of the listed databases")?,
            }
        }
    }
}
