use crate::completion::CmdCompleter;
use anyhow::{Context, Result};
use reedline::{
    ColumnarMenu, Emacs, KeyCode, KeyModifiers, MenuBuilder, Prompt, PromptEditMode,
    PromptHistorySearch, PromptHistorySearchStatus, Reedline, ReedlineEvent, ReedlineMenu,
    Signal, default_emacs_keybindings,
};
use std::{borrow::Cow, fs, path::Path, vec};

pub(crate) enum Line {
    Text(String),
    Interrupted,
    Eof,
}

struct ShellPrompt;

impl Prompt for ShellPrompt {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        Cow::Borrowed(">>>")
    }

    fn render_prompt_right(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _mode: PromptEditMode) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        Cow::Borrowed("::: ")
    }

    fn render_prompt_history_search_indicator(
        &self,
        search: PromptHistorySearch,
    ) -> Cow<'_, str> {
        let prefix = match search.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "failing ",
        };
        Cow::Owned(format!("({}reverse-search: {}) ", prefix, search.term))
    }
}

enum Source {
    Console { editor: Box<Reedline>, prompt: ShellPrompt },
    Script { lines: vec::IntoIter<String> },
}

/// Hands the shell one line at a time, either from the reedline editor or
/// from a script loaded by the `script` command.
pub(crate) struct InputReader {
    src: Source,
}

impl InputReader {
    pub(crate) fn console() -> Self {
        let menu = Box::new(ColumnarMenu::default().with_name("completions"));
        let mut keybindings = default_emacs_keybindings();
        keybindings.add_binding(
            KeyModifiers::NONE,
            KeyCode::Tab,
            ReedlineEvent::UntilFound(vec![
                ReedlineEvent::Menu("completions".to_string()),
                ReedlineEvent::MenuNext,
            ]),
        );
        let editor = Reedline::create()
            .with_completer(Box::new(CmdCompleter::new()))
            .with_menu(ReedlineMenu::EngineCompleter(menu))
            .with_edit_mode(Box::new(Emacs::new(keybindings)));
        InputReader { src: Source::Console { editor: Box::new(editor), prompt: ShellPrompt } }
    }

    pub(crate) fn script(path: &Path) -> Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("reading script {path:?}"))?;
        let lines: Vec<String> = text.lines().map(String::from).collect();
        Ok(InputReader { src: Source::Script { lines: lines.into_iter() } })
    }

    pub(crate) fn read_line(&mut self) -> Result<Line> {
        match &mut self.src {
            Source::Script { lines } => Ok(match lines.next() {
                Some(line) => Line::Text(line),
                None => Line::Eof,
            }),
            Source::Console { editor, prompt } => match editor.read_line(prompt)? {
                Signal::Success(line) => Ok(Line::Text(line)),
                Signal::CtrlC => Ok(Line::Interrupted),
                Signal::CtrlD => Ok(Line::Eof),
            },
        }
    }
}
