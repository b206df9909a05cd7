use serde::Serialize;
use serde_json::{json, Value};

const PLAY_PAUSE_BUTTON: &str = r#"[data-testid="control-button-playpause"]"#;
const SKIP_FORWARD_BUTTON: &str = r#"[data-testid="control-button-skip-forward"]"#;
const SKIP_BACK_BUTTON: &str = r#"[data-testid="control-button-skip-back"]"#;
const SAVE_BUTTON: &str = r#"[data-testid="now-playing-widget"] [data-testid="add-button"]"#;
const VOLUME_SLIDER: &str = r#"[data-testid="volume-bar"] input[type="range"]"#;
const PROGRESS_SLIDER: &str = r#"[data-testid="playback-progressbar"] input[type="range"]"#;

/// Click a control. `wantPlaying` (true/false/null) skips the click when the
/// button already shows the requested state.
const CLICK_CONTROL: &str = r#"(selector, wantPlaying) => {
  const el = document.querySelector(selector);
  if (!el) throw new Error(`control not found: ${selector}`);
  if (wantPlaying !== null) {
    const label = (el.getAttribute('aria-label') || '').toLowerCase();
    const showsPause = label.includes('pause');
    if (showsPause === wantPlaying) return true;
  }
  el.click();
  return true;
}"#;

/// Click the heart only when its checked state differs from `wantSaved`.
const TOGGLE_SAVED: &str = r#"(selector, wantSaved) => {
  const el = document.querySelector(selector);
  if (!el) throw new Error(`control not found: ${selector}`);
  const saved = el.getAttribute('aria-checked') === 'true';
  if (saved !== wantSaved) el.click();
  return true;
}"#;

/// Move a range input to `fraction` of its span and let the page's own
/// listeners observe the change.
const SET_RANGE: &str = r#"(selector, fraction) => {
  const el = document.querySelector(selector);
  if (!el) throw new Error(`control not found: ${selector}`);
  const min = Number(el.min || 0);
  const max = Number(el.max || 1);
  const value = min + (max - min) * Math.min(Math.max(fraction, 0), 1);
  const setter = Object.getOwnPropertyDescriptor(HTMLInputElement.prototype, 'value').set;
  setter.call(el, String(value));
  el.dispatchEvent(new Event('input', { bubbles: true }));
  el.dispatchEvent(new Event('change', { bubbles: true }));
  return true;
}"#;

/// A function to run inside the page plus its JSON arguments, the shape
/// browser scripting APIs take.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageScript {
    pub function: &'static str,
    pub args: Vec<Value>,
}

impl PageScript {
    pub fn click(selector: &str, want_playing: Option<bool>) -> Self {
        Self {
            function: CLICK_CONTROL,
            args: vec![json!(selector), json!(want_playing)],
        }
    }

    pub fn toggle_saved(want_saved: bool) -> Self {
        Self {
            function: TOGGLE_SAVED,
            args: vec![json!(SAVE_BUTTON), json!(want_saved)],
        }
    }

    pub fn set_range(selector: &str, fraction: f64) -> Self {
        Self {
            function: SET_RANGE,
            args: vec![json!(selector), json!(fraction)],
        }
    }

    /// Self-contained expression for hosts that can only evaluate source.
    pub fn to_expression(&self) -> String {
        let args: Vec<String> = self.args.iter().map(Value::to_string).collect();
        format!("({})({})", self.function, args.join(", "))
    }

    pub fn selector(&self) -> Option<&str> {
        self.args.first().and_then(Value::as_str)
    }
}

pub(super) fn play() -> PageScript {
    PageScript::click(PLAY_PAUSE_BUTTON, Some(true))
}

pub(super) fn pause() -> PageScript {
    PageScript::click(PLAY_PAUSE_BUTTON, Some(false))
}

pub(super) fn skip_forward() -> PageScript {
    PageScript::click(SKIP_FORWARD_BUTTON, None)
}

pub(super) fn skip_back() -> PageScript {
    PageScript::click(SKIP_BACK_BUTTON, None)
}

pub(super) fn seek_fraction(fraction: f64) -> PageScript {
    PageScript::set_range(PROGRESS_SLIDER, fraction)
}

pub(super) fn volume_fraction(fraction: f64) -> PageScript {
    PageScript::set_range(VOLUME_SLIDER, fraction)
}
