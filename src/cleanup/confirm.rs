use std::io::{self, BufRead, Write};

/// Human-in-the-loop gate in front of destructive operations
pub trait Confirmer: Send + Sync {
    /// Show what is about to happen and ask for a yes/no answer
    fn confirm(&self, question: &str, items: &[String]) -> bool;
}

/// Prompts on stdout and reads the answer from stdin
pub struct StdinConfirmer;

impl Confirmer for StdinConfirmer {
    fn confirm(&self, question: &str, items: &[String]) -> bool {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        for item in items {
            let _ = writeln!(out, "   - {}", item);
        }
        let _ = write!(out, "\n{} (yes/no): ", question);
        let _ = out.flush();
        drop(out);

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => is_affirmative(&answer),
            Err(_) => false,
        }
    }
}

/// Non-interactive mode (`--confirm`)
pub struct AssumeYes;

impl Confirmer for AssumeYes {
    fn confirm(&self, _question: &str, _items: &[String]) -> bool {
        true
    }
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
