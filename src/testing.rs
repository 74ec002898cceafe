//! Scripted engine and host for unit tests

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::inference::backend::{Batch, Engine, EngineError, InferenceContext, Token};
use crate::inference::sampling::SUPPRESSED_LOGIT;
use crate::platform::{Console, Host, PadState};
use crate::storage::settings::EngineConfig;

/// What the fake engine tokenizes to, and which logits it produces after
/// each decode.
#[derive(Debug, Clone)]
pub struct MockScript {
    pub n_vocab: i32,
    pub eos: Token,
    pub eog: Vec<Token>,
    pub prompt_tokens: Vec<Token>,
    /// Row `i` is served after the prefill (i = 0) or after the i-th
    /// single-token decode. The last row repeats once the script runs out.
    pub rows: Vec<Vec<f32>>,
    pub pieces: HashMap<Token, Vec<u8>>,
    pub fail_prefill: bool,
    /// 1-based index of the single-token decode that fails
    pub fail_step: Option<usize>,
    /// Token returned by every `sample` call regardless of the logits
    pub forced_sample: Option<Token>,
}

impl MockScript {
    pub fn new(n_vocab: i32, eos: i32) -> Self {
        Self {
            n_vocab,
            eos: Token(eos),
            eog: Vec::new(),
            prompt_tokens: vec![Token(1), Token(2), Token(3)],
            rows: vec![vec![0.0; n_vocab as usize]],
            pieces: HashMap::new(),
            fail_prefill: false,
            fail_step: None,
            forced_sample: None,
        }
    }

    pub fn with_prompt(mut self, tokens: &[i32]) -> Self {
        self.prompt_tokens = tokens.iter().map(|&t| Token(t)).collect();
        self
    }

    /// One row per token, each with that token as the clear winner.
    pub fn emitting(mut self, tokens: &[i32]) -> Self {
        let rows = tokens.iter().map(|&t| self.one_hot(t, 10.0)).collect();
        self.rows = rows;
        self
    }

    pub fn with_rows(mut self, rows: Vec<Vec<f32>>) -> Self {
        self.rows = rows;
        self
    }

    pub fn with_piece(mut self, token: i32, piece: &str) -> Self {
        self.pieces.insert(Token(token), piece.as_bytes().to_vec());
        self
    }

    pub fn with_eog(mut self, token: i32) -> Self {
        self.eog.push(Token(token));
        self
    }

    pub fn failing_prefill(mut self) -> Self {
        self.fail_prefill = true;
        self
    }

    pub fn failing_step(mut self, step: usize) -> Self {
        self.fail_step = Some(step);
        self
    }

    pub fn always_sampling(mut self, token: i32) -> Self {
        self.forced_sample = Some(Token(token));
        self
    }

    pub fn one_hot(&self, token: i32, value: f32) -> Vec<f32> {
        let mut row = vec![0.0; self.n_vocab as usize];
        row[token as usize] = value;
        row
    }
}

pub struct MockContext<'m> {
    script: &'m MockScript,
    /// Texts handed to `tokenize`, shared with the engine that opened us
    prompts: Option<&'m RefCell<Vec<String>>>,
    pub decoded: Vec<Batch>,
    /// The `suppress` argument of every `sample` call
    pub suppressions: Vec<Option<Token>>,
    single_decodes: usize,
    last_output: Option<i32>,
}

impl<'m> MockContext<'m> {
    pub fn new(script: &'m MockScript) -> Self {
        Self {
            script,
            prompts: None,
            decoded: Vec::new(),
            suppressions: Vec::new(),
            single_decodes: 0,
            last_output: None,
        }
    }

    pub fn decode_calls(&self) -> usize {
        self.decoded.len()
    }
}

impl InferenceContext for MockContext<'_> {
    fn tokenize(&self, text: &str, _add_bos: bool) -> Result<Vec<Token>, EngineError> {
        if let Some(prompts) = self.prompts {
            prompts.borrow_mut().push(text.to_string());
        }
        Ok(self.script.prompt_tokens.clone())
    }

    fn decode(&mut self, batch: &Batch) -> Result<(), EngineError> {
        let is_prefill = self.decoded.is_empty();
        self.decoded.push(batch.clone());
        self.last_output = None;

        if is_prefill {
            if self.script.fail_prefill {
                return Err(EngineError::Decode("prefill rejected".to_string()));
            }
        } else {
            self.single_decodes += 1;
            if self.script.fail_step == Some(self.single_decodes) {
                return Err(EngineError::Decode("no KV slot".to_string()));
            }
        }
        self.last_output = batch.last_output_index();
        Ok(())
    }

    fn logits(&self, batch_index: i32) -> Option<&[f32]> {
        if self.last_output != Some(batch_index) {
            return None;
        }
        self.script
            .rows
            .get(self.single_decodes)
            .or_else(|| self.script.rows.last())
            .map(Vec::as_slice)
    }

    fn sample(&mut self, batch_index: i32, suppress: Option<Token>) -> Option<Token> {
        self.suppressions.push(suppress);
        let mut row = self.logits(batch_index)?.to_vec();
        if let Some(forced) = self.script.forced_sample {
            return Some(forced);
        }
        if let Some(i) = suppress.and_then(|t| t.index(row.len() as i32)) {
            row[i] = SUPPRESSED_LOGIT;
        }
        // argmax, first maximum wins
        let mut best: Option<(usize, f32)> = None;
        for (i, &logit) in row.iter().enumerate() {
            match best {
                Some((_, top)) if logit <= top || logit.is_nan() => {}
                _ => best = Some((i, logit)),
            }
        }
        best.map(|(i, _)| Token(i as i32))
    }

    fn n_vocab(&self) -> i32 {
        self.script.n_vocab
    }

    fn token_eos(&self) -> Token {
        self.script.eos
    }

    fn is_eog(&self, token: Token) -> bool {
        token == self.script.eos || self.script.eog.contains(&token)
    }

    fn token_piece(&self, token: Token) -> Vec<u8> {
        self.script
            .pieces
            .get(&token)
            .cloned()
            .unwrap_or_else(|| format!(" w{}", token.0).into_bytes())
    }
}

#[derive(Debug)]
pub struct MockModel {
    pub serial: usize,
    pub path: PathBuf,
}

/// Engine that counts loads and serves [`MockContext`]s over one script.
pub struct MockEngine {
    pub script: MockScript,
    pub progress: Vec<f32>,
    pub fail_load: bool,
    pub fail_context: bool,
    pub loads: Cell<usize>,
    pub contexts: Cell<usize>,
    /// Every text tokenized by contexts this engine opened
    pub prompts: RefCell<Vec<String>>,
}

impl MockEngine {
    pub fn new(script: MockScript) -> Self {
        Self {
            script,
            progress: vec![0.0, 0.25, 0.25, 0.5, 1.0],
            fail_load: false,
            fail_context: false,
            loads: Cell::new(0),
            contexts: Cell::new(0),
            prompts: RefCell::new(Vec::new()),
        }
    }
}

impl Engine for MockEngine {
    type Model = MockModel;
    type Context<'m> = MockContext<'m> where Self: 'm;

    fn load_model(
        &self,
        path: &Path,
        _config: &EngineConfig,
        progress: &mut dyn FnMut(f32) -> bool,
    ) -> Result<MockModel, EngineError> {
        self.loads.set(self.loads.get() + 1);
        for &fraction in &self.progress {
            if !progress(fraction) {
                return Err(EngineError::LoadAborted);
            }
        }
        if self.fail_load {
            return Err(EngineError::ModelLoad("unknown tensor type".to_string()));
        }
        Ok(MockModel {
            serial: self.loads.get(),
            path: path.to_path_buf(),
        })
    }

    fn new_context<'m>(
        &'m self,
        _model: &'m MockModel,
        _config: &EngineConfig,
    ) -> Result<MockContext<'m>, EngineError> {
        self.contexts.set(self.contexts.get() + 1);
        if self.fail_context {
            return Err(EngineError::ContextCreate("out of memory".to_string()));
        }
        let mut ctx = MockContext::new(&self.script);
        ctx.prompts = Some(&self.prompts);
        Ok(ctx)
    }
}

/// Host that records the console and answers liveness from a budget.
#[derive(Debug, Default)]
pub struct ScriptedHost {
    /// Lines printed since the last clear
    pub screen: Vec<String>,
    /// Every line ever printed
    pub printed: Vec<String>,
    pub clears: usize,
    pub draws: usize,
    pub idles: usize,
    pub menu_requests: usize,
    /// Remaining `true` answers from `is_running`
    pub running_for: usize,
    pub pad: VecDeque<PadState>,
    pub keyboard: Option<String>,
    pub keyboard_hints: Vec<String>,
}

impl ScriptedHost {
    pub fn running_for(polls: usize) -> Self {
        Self {
            running_for: polls,
            ..Self::default()
        }
    }
}

impl Console for ScriptedHost {
    fn clear(&mut self) {
        self.clears += 1;
        self.screen.clear();
    }

    fn print(&mut self, line: &str) {
        self.screen.push(line.to_string());
        self.printed.push(line.to_string());
    }

    fn draw(&mut self) {
        self.draws += 1;
    }
}

impl Host for ScriptedHost {
    fn is_running(&mut self) -> bool {
        if self.menu_requests > 0 || self.running_for == 0 {
            return false;
        }
        self.running_for -= 1;
        true
    }

    fn poll_pad(&mut self) -> PadState {
        self.pad.pop_front().unwrap_or_default()
    }

    fn keyboard_input(&mut self, hint: &str) -> String {
        self.keyboard_hints.push(hint.to_string());
        self.keyboard.take().unwrap_or_default()
    }

    fn launch_menu(&mut self) {
        self.menu_requests += 1;
    }

    fn idle(&mut self, _duration: Duration) {
        self.idles += 1;
    }
}
