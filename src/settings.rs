use serde::{Deserialize, Serialize};

use crate::pagination::{LayoutParams, Sides, Strategy};

/// Smallest page height the font-size keys can shrink to.
pub const MIN_HEIGHT: usize = 10;
/// Narrowest page the settings editor allows.
pub const MIN_WIDTH: usize = 20;

pub const TTS_PRESET_LIST: &[&str] = &["espeak", "espeak-ng", "say", "powershell"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub width: usize,
    pub height: usize,
    pub margin: usize,
    pub padding: usize,
    pub margin_top: Option<usize>,
    pub margin_bottom: Option<usize>,
    pub margin_left: Option<usize>,
    pub margin_right: Option<usize>,
    pub padding_top: Option<usize>,
    pub padding_bottom: Option<usize>,
    pub padding_left: Option<usize>,
    pub padding_right: Option<usize>,
    pub lines_per_page: Option<usize>,
    pub strategy: Strategy,
    /// Follow the terminal size instead of `width`/`height`.
    pub fit_to_terminal: bool,
    pub show_progress: bool,
    pub forced_encoding: Option<String>,
    pub preferred_tts_engine: Option<String>,
    pub tts_speed: u8,
    pub auto_flip: bool,
    /// Seconds between automatic page turns.
    pub auto_flip_interval: u64,
    /// Minutes of continuous reading before a break reminder; 0 disables it.
    pub remind_interval: u64,
}

impl Settings {
    pub fn margins(&self) -> Sides {
        Sides {
            top: self.margin_top.unwrap_or(self.margin),
            bottom: self.margin_bottom.unwrap_or(self.margin),
            left: self.margin_left.unwrap_or(self.margin),
            right: self.margin_right.unwrap_or(self.margin),
        }
    }

    pub fn paddings(&self) -> Sides {
        Sides {
            top: self.padding_top.unwrap_or(self.padding),
            bottom: self.padding_bottom.unwrap_or(self.padding),
            left: self.padding_left.unwrap_or(self.padding),
            right: self.padding_right.unwrap_or(self.padding),
        }
    }

    /// Layout using the configured page size.
    pub fn layout(&self) -> LayoutParams {
        self.layout_for(self.width, self.height)
    }

    /// Layout for an explicit page size, keeping margins and padding.
    pub fn layout_for(&self, width: usize, height: usize) -> LayoutParams {
        LayoutParams::new(width, height)
            .with_margin(self.margins())
            .with_padding(self.paddings())
            .with_lines_per_page(self.lines_per_page)
    }

    /// Font-size proxy: a larger font shows fewer rows.
    pub fn change_font_size(&mut self, delta: i32) {
        if delta > 0 {
            self.height = self.height.saturating_sub(2);
        } else if delta < 0 {
            self.height += 2;
        }
        self.height = self.height.max(MIN_HEIGHT);
    }
}

/// Entries of the in-app settings editor, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingItem {
    Width,
    Height,
    Margin,
    Padding,
    LinesPerPage,
    Strategy,
    FitToTerminal,
    ShowProgress,
    TtsEngine,
    TtsSpeed,
    AutoFlipInterval,
    RemindInterval,
}

impl SettingItem {
    pub fn all() -> &'static [SettingItem] {
        &[
            SettingItem::Width,
            SettingItem::Height,
            SettingItem::Margin,
            SettingItem::Padding,
            SettingItem::LinesPerPage,
            SettingItem::Strategy,
            SettingItem::FitToTerminal,
            SettingItem::ShowProgress,
            SettingItem::TtsEngine,
            SettingItem::TtsSpeed,
            SettingItem::AutoFlipInterval,
            SettingItem::RemindInterval,
        ]
    }

    /// Whether a change needs the book re-paginated.
    pub fn affects_layout(self) -> bool {
        matches!(
            self,
            SettingItem::Width
                | SettingItem::Height
                | SettingItem::Margin
                | SettingItem::Padding
                | SettingItem::LinesPerPage
                | SettingItem::Strategy
                | SettingItem::FitToTerminal
        )
    }

    pub fn describe(self, settings: &Settings) -> String {
        match self {
            SettingItem::Width => format!("Page width: {}", settings.width),
            SettingItem::Height => format!("Page height: {}", settings.height),
            SettingItem::Margin => format!("Margin: {}", settings.margin),
            SettingItem::Padding => format!("Padding: {}", settings.padding),
            SettingItem::LinesPerPage => match settings.lines_per_page {
                Some(lines) => format!("Lines per page: {}", lines),
                None => "Lines per page: auto".to_string(),
            },
            SettingItem::Strategy => format!("Pagination: {}", settings.strategy),
            SettingItem::FitToTerminal => format!("Fit to terminal: {}", settings.fit_to_terminal),
            SettingItem::ShowProgress => format!("Show progress: {}", settings.show_progress),
            SettingItem::TtsEngine => format!(
                "TTS engine: {}",
                settings.preferred_tts_engine.as_deref().unwrap_or("default")
            ),
            SettingItem::TtsSpeed => format!("TTS speed: {}", settings.tts_speed),
            SettingItem::AutoFlipInterval => {
                format!("Auto flip interval: {}s", settings.auto_flip_interval)
            }
            SettingItem::RemindInterval => match settings.remind_interval {
                0 => "Break reminder: off".to_string(),
                minutes => format!("Break reminder: {}m", minutes),
            },
        }
    }

    /// Step the value up (`delta > 0`) or down. Flags toggle and choices
    /// cycle in the matching direction.
    pub fn adjust(self, settings: &mut Settings, delta: i32) {
        let up = delta >= 0;
        match self {
            SettingItem::Width => {
                settings.width = step(settings.width, up, 2).max(MIN_WIDTH);
            }
            SettingItem::Height => {
                settings.height = step(settings.height, up, 2).max(MIN_HEIGHT);
            }
            SettingItem::Margin => settings.margin = step(settings.margin, up, 1).min(10),
            SettingItem::Padding => settings.padding = step(settings.padding, up, 1).min(10),
            SettingItem::LinesPerPage => {
                let lines = step(settings.lines_per_page.unwrap_or(0), up, 5).min(200);
                settings.lines_per_page = (lines > 0).then_some(lines);
            }
            SettingItem::Strategy => {
                settings.strategy = if up {
                    settings.strategy.next()
                } else {
                    settings.strategy.next().next()
                };
            }
            SettingItem::FitToTerminal => settings.fit_to_terminal = !settings.fit_to_terminal,
            SettingItem::ShowProgress => settings.show_progress = !settings.show_progress,
            SettingItem::TtsEngine => {
                // Slot 0 is the platform default; a custom command counts as it.
                let slots = TTS_PRESET_LIST.len() + 1;
                let current = settings
                    .preferred_tts_engine
                    .as_deref()
                    .and_then(|engine| TTS_PRESET_LIST.iter().position(|preset| *preset == engine))
                    .map_or(0, |index| index + 1);
                let next = if up {
                    (current + 1) % slots
                } else {
                    (current + slots - 1) % slots
                };
                settings.preferred_tts_engine =
                    next.checked_sub(1).map(|index| TTS_PRESET_LIST[index].to_string());
            }
            SettingItem::TtsSpeed => {
                settings.tts_speed = if up {
                    settings.tts_speed.saturating_add(1)
                } else {
                    settings.tts_speed.saturating_sub(1)
                }
                .clamp(1, 10);
            }
            SettingItem::AutoFlipInterval => {
                settings.auto_flip_interval =
                    step(settings.auto_flip_interval as usize, up, 1).clamp(1, 600) as u64;
            }
            SettingItem::RemindInterval => {
                settings.remind_interval =
                    step(settings.remind_interval as usize, up, 5).min(240) as u64;
            }
        }
    }
}

fn step(value: usize, up: bool, amount: usize) -> usize {
    if up {
        value.saturating_add(amount)
    } else {
        value.saturating_sub(amount)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            width: 80,
            height: 24,
            margin: 1,
            padding: 1,
            margin_top: None,
            margin_bottom: None,
            margin_left: None,
            margin_right: None,
            padding_top: None,
            padding_bottom: None,
            padding_left: None,
            padding_right: None,
            lines_per_page: None,
            strategy: Strategy::Reflow,
            fit_to_terminal: true,
            show_progress: true,
            forced_encoding: None,
            preferred_tts_engine: None,
            tts_speed: 5,
            auto_flip: false,
            auto_flip_interval: 5,
            remind_interval: 30,
        }
    }
}
