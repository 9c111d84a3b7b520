use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, TryRecvError};

use eyre::Result;
use ratatui::backend::Backend;

use crate::logging;
use crate::models::MessageType;
use crate::pagination::Pages;

use super::Reader;

/// Program and arguments for one utterance; the text itself goes to stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtsCommand {
    pub program: String,
    pub args: Vec<String>,
}

pub fn platform_default_engine() -> &'static str {
    if cfg!(target_os = "macos") {
        "say"
    } else if cfg!(windows) {
        "powershell"
    } else {
        "espeak"
    }
}

/// Build the speech command. `speed` runs from 1 (slow) to 10 (fast).
/// Anything outside the presets is treated as a command line of its own.
pub fn build_command(engine: Option<&str>, speed: u8) -> Option<TtsCommand> {
    let engine = engine
        .map(str::trim)
        .filter(|engine| !engine.is_empty())
        .unwrap_or(platform_default_engine());
    let speed = i32::from(speed.clamp(1, 10));

    let (program, args) = match engine {
        "espeak" | "espeak-ng" => (
            engine.to_string(),
            vec!["--stdin".to_string(), "-s".to_string(), (speed * 30).to_string()],
        ),
        "say" => (
            "say".to_string(),
            vec![
                "-r".to_string(),
                (150 + (speed - 1) * 15).to_string(),
                "-f".to_string(),
                "-".to_string(),
            ],
        ),
        "powershell" => (
            "powershell".to_string(),
            vec![
                "-NoProfile".to_string(),
                "-Command".to_string(),
                format!(
                    "Add-Type -AssemblyName System.Speech; \
                     $speak = New-Object System.Speech.Synthesis.SpeechSynthesizer; \
                     $speak.Rate = {}; \
                     $speak.Speak([Console]::In.ReadToEnd());",
                    ((speed - 5) * 2).clamp(-10, 10)
                ),
            ],
        ),
        custom => {
            let mut parts = custom.split_whitespace().map(str::to_string);
            let program = parts.next()?;
            (program, parts.collect())
        }
    };

    Some(TtsCommand { program, args })
}

/// A speech subprocess running in its own process group.
#[derive(Default)]
pub struct TtsPlayer {
    done_rx: Option<Receiver<()>>,
    kill_pid: Option<u32>,
}

impl TtsPlayer {
    pub fn is_active(&self) -> bool {
        self.done_rx.is_some()
    }

    pub fn speak(&mut self, command: &TtsCommand, text: &str) -> Result<()> {
        self.stop();

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // A new session lets stop() kill the engine and anything it spawned.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            unsafe {
                cmd.pre_exec(|| {
                    libc::setsid();
                    Ok(())
                });
            }
        }

        let mut child = cmd.spawn()?;
        let pid = child.id();
        let mut stdin = child.stdin.take();
        let text = text.to_string();
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || {
            if let Some(stdin) = stdin.as_mut()
                && let Err(err) = stdin.write_all(text.as_bytes())
            {
                logging::debug(format!("TTS stdin closed early: {}", err));
            }
            drop(stdin);
            let _ = child.wait();
            let _ = tx.send(());
        });

        self.done_rx = Some(rx);
        self.kill_pid = Some(pid);
        Ok(())
    }

    /// True once, when the current utterance has ended on its own.
    pub fn finished(&mut self) -> bool {
        let Some(rx) = &self.done_rx else {
            return false;
        };
        match rx.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => {
                self.done_rx = None;
                self.kill_pid = None;
                true
            }
            Err(TryRecvError::Empty) => false,
        }
    }

    pub fn stop(&mut self) {
        if let Some(pid) = self.kill_pid.take() {
            #[cfg(unix)]
            unsafe {
                libc::kill(-(pid as i32), libc::SIGKILL);
            }
            #[cfg(not(unix))]
            {
                let _ = Command::new("taskkill")
                    .args(["/PID", &pid.to_string(), "/T", "/F"])
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status();
            }
        }
        self.done_rx = None;
    }
}

impl Drop for TtsPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// First page at or after `from` with text to read out.
pub fn next_speakable_page(pages: &Pages, from: usize) -> Option<usize> {
    (from..pages.total()).find(|&index| pages.get(index).is_some_and(|text| !text.trim().is_empty()))
}

impl<B: Backend> Reader<B> {
    pub(super) fn toggle_tts(&mut self) -> Result<()> {
        if self.state.ui_state.tts_active {
            self.stop_tts();
            self.state
                .ui_state
                .set_message("Read aloud off".to_string(), MessageType::Info);
            return Ok(());
        }
        self.state.ui_state.tts_active = true;
        self.tts_speak_current()
    }

    /// Speak the page on screen, skipping forward over blank pages.
    pub(super) fn tts_speak_current(&mut self) -> Result<()> {
        let current = self.state.reading_state.page;
        let Some(page) = next_speakable_page(&self.pages, current) else {
            self.stop_tts();
            self.state
                .ui_state
                .set_message("TTS finished".to_string(), MessageType::Info);
            return Ok(());
        };
        if page != current {
            self.goto_page(page);
        }
        let text = self.pages.get(page).unwrap_or_default().to_string();

        let settings = &self.state.config.settings;
        let Some(command) = build_command(settings.preferred_tts_engine.as_deref(), settings.tts_speed)
        else {
            self.stop_tts();
            self.state
                .ui_state
                .set_message("No TTS engine configured".to_string(), MessageType::Error);
            return Ok(());
        };

        logging::debug(format!("TTS: {} {:?}", command.program, command.args));
        if let Err(err) = self.tts.speak(&command, &text) {
            self.stop_tts();
            self.state
                .ui_state
                .set_message(format!("TTS failed: {err}"), MessageType::Error);
        }
        Ok(())
    }

    /// Called when a page has been read out: turn the page and keep going.
    pub(super) fn tts_advance_page(&mut self) -> Result<()> {
        let next = self.state.reading_state.page + 1;
        if next >= self.pages.total() {
            self.stop_tts();
            self.state
                .ui_state
                .set_message("TTS finished".to_string(), MessageType::Info);
            return Ok(());
        }
        self.goto_page(next);
        self.tts_speak_current()
    }

    pub(super) fn stop_tts(&mut self) {
        self.tts.stop();
        self.state.ui_state.tts_active = false;
    }
}
