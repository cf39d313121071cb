use crate::engine::client::{ByteStream, MockEngineTransport};
use crate::types::{InterruptValue, ResumeCommand};
use anyhow::Result;
use bytes::Bytes;
use futures::stream;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// One scripted stream pass.
#[derive(Default, Clone)]
pub struct ScriptedPass {
    pub frames: Vec<String>,
    pub fail_mid_stream: bool,
}

impl ScriptedPass {
    pub fn with_frames(frames: Vec<String>) -> Self {
        Self {
            frames,
            fail_mid_stream: false,
        }
    }
}

/// Scripted engine transport. Passes are consumed in order by `open_stream`;
/// persisted-state queries pop `pending_answers` in order (defaulting to no
/// pending interrupt once exhausted); resume commands and pass inputs are
/// recorded for assertions.
#[derive(Clone)]
pub struct MockEngineClient {
    passes: Arc<Mutex<VecDeque<ScriptedPass>>>,
    pending_answers: Arc<Mutex<VecDeque<Option<InterruptValue>>>>,
    resumes: Arc<Mutex<Vec<ResumeCommand>>>,
    inputs: Arc<Mutex<Vec<Option<String>>>>,
}

impl MockEngineClient {
    pub fn new(passes: Vec<ScriptedPass>) -> Self {
        Self {
            passes: Arc::new(Mutex::new(passes.into_iter().collect())),
            pending_answers: Arc::new(Mutex::new(VecDeque::new())),
            resumes: Arc::new(Mutex::new(Vec::new())),
            inputs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_pending_answers(self, answers: Vec<Option<InterruptValue>>) -> Self {
        *self.pending_answers.lock().unwrap() = answers.into_iter().collect();
        self
    }

    pub fn recorded_resumes(&self) -> Vec<bool> {
        self.resumes
            .lock()
            .unwrap()
            .iter()
            .map(|command| command.approved)
            .collect()
    }

    pub fn recorded_inputs(&self) -> Vec<Option<String>> {
        self.inputs.lock().unwrap().clone()
    }
}

impl MockEngineTransport for MockEngineClient {
    fn open_stream(&self, input: Option<&str>, _mode: &str) -> Result<ByteStream> {
        self.inputs.lock().unwrap().push(input.map(str::to_string));

        let mut passes_guard = self.passes.lock().unwrap();
        let Some(pass) = passes_guard.pop_front() else {
            return Err(anyhow::anyhow!("MockEngineClient: no more passes scripted"));
        };

        let mut chunks: Vec<Result<Bytes>> = pass
            .frames
            .into_iter()
            .map(|frame| {
                let framed = if frame.ends_with("\n\n") {
                    frame
                } else {
                    format!("{frame}\n\n")
                };
                Ok(Bytes::from(framed))
            })
            .collect();

        if pass.fail_mid_stream {
            chunks.push(Err(anyhow::anyhow!("scripted stream failure")));
        }

        Ok(Box::pin(stream::iter(chunks)))
    }

    fn pending_interrupt(&self) -> Result<Option<InterruptValue>> {
        Ok(self
            .pending_answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(None))
    }

    fn record_resume(&self, command: &ResumeCommand) -> Result<()> {
        self.resumes.lock().unwrap().push(command.clone());
        Ok(())
    }
}
