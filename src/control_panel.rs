//! Operator-facing settings: volume, random fallback, jingles, header text.

#[derive(Debug, Clone)]
pub struct ControlPanel {
    volume: f32,
    random_active: bool,
    jingles_enabled: bool,
    header_text: String,
    intro_name: Option<String>,
    outro_name: Option<String>,
}

impl ControlPanel {
    pub fn new(volume: f32, random_active: bool, jingles_enabled: bool) -> Self {
        ControlPanel {
            volume: volume.clamp(0.0, 1.0),
            random_active,
            jingles_enabled,
            header_text: String::new(),
            intro_name: None,
            outro_name: None,
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Set volume, clamped to 0.0–1.0.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn random_active(&self) -> bool {
        self.random_active
    }

    pub fn set_random_active(&mut self, active: bool) {
        self.random_active = active;
    }

    pub fn toggle_random(&mut self) -> bool {
        self.random_active = !self.random_active;
        self.random_active
    }

    /// Intro and outro are switched together.
    pub fn jingles_enabled(&self) -> bool {
        self.jingles_enabled
    }

    pub fn set_jingles_enabled(&mut self, enabled: bool) {
        self.jingles_enabled = enabled;
    }

    pub fn toggle_jingles(&mut self) -> bool {
        self.jingles_enabled = !self.jingles_enabled;
        self.jingles_enabled
    }

    pub fn header_text(&self) -> &str {
        &self.header_text
    }

    pub fn set_header_text(&mut self, text: impl Into<String>) {
        self.header_text = text.into();
    }

    /// Names of the loaded jingles, shown next to the switch.
    pub fn set_jingle_names(&mut self, intro: Option<String>, outro: Option<String>) {
        self.intro_name = intro;
        self.outro_name = outro;
    }

    pub fn render(&self) -> String {
        let on_off = |b: bool| if b { "on" } else { "off" };
        let jingles = match (&self.intro_name, &self.outro_name) {
            (None, None) => "none loaded".to_string(),
            (intro, outro) => format!(
                "intro: {}, outro: {}",
                intro.as_deref().unwrap_or("-"),
                outro.as_deref().unwrap_or("-")
            ),
        };
        format!(
            "== {} ==\nvolume {:>3}% | random fallback {} | jingles {} ({})",
            if self.header_text.is_empty() {
                "no input"
            } else {
                &self.header_text
            },
            (self.volume * 100.0).round() as u32,
            on_off(self.random_active),
            on_off(self.jingles_enabled),
            jingles
        )
    }
}
