use std::borrow::Cow;

use anyhow::{Context, Result};
use logos::Logos;
use lox_syntax::lexer::Token;
use nu_ansi_term::{Color, Style};
use reedline::{
    EditCommand, Emacs, FileBackedHistory, KeyCode, KeyModifiers, PromptEditMode,
    PromptHistorySearch, Reedline, ReedlineEvent, StyledText, ValidationResult,
};

pub fn editor() -> Result<Reedline> {
    let mut keybindings = reedline::default_emacs_keybindings();
    keybindings.add_binding(
        KeyModifiers::ALT,
        KeyCode::Enter,
        ReedlineEvent::Edit(vec![EditCommand::InsertNewline]),
    );

    let data_dir = dirs::data_dir().context("could not find data directory")?;
    let history_path = data_dir.join("lox/history.txt");
    let history = Box::new(
        FileBackedHistory::with_file(10000, history_path.clone())
            .with_context(|| format!("could not open history file: {}", history_path.display()))?,
    );

    let editor = Reedline::create()
        .with_edit_mode(Box::new(Emacs::new(keybindings)))
        .with_highlighter(Box::new(Highlighter))
        .with_history(history)
        .with_validator(Box::new(Validator));
    Ok(editor)
}

// Color scheme inspired by base16-google-dark, with each color replaced by its
// high-intensity variant.
const PLAIN: Color = Color::LightGray;
const COMMENT: Color = Color::DarkGray;
const CONSTANT: Color = Color::LightCyan;
const KEYWORD: Color = Color::LightPurple;
const STRING: Color = Color::LightGreen;
const VARIABLE: Color = Color::LightRed;

fn color(token: &Token) -> Color {
    match token {
        Token::Identifier(_) => VARIABLE,
        Token::String(_) => STRING,
        Token::Number(_) | Token::False | Token::Nil | Token::True => CONSTANT,
        token if token.is_keyword() => KEYWORD,
        _ => PLAIN,
    }
}

/// Colors the line with the language's own lexer. Text the lexer skips is
/// either whitespace or a comment.
struct Highlighter;

impl Highlighter {
    fn push_skipped(output: &mut StyledText, text: &str) {
        match text.find("//") {
            Some(idx) => {
                output.push((Style::new().fg(PLAIN), text[..idx].to_string()));
                output.push((Style::new().fg(COMMENT), text[idx..].to_string()));
            }
            None => output.push((Style::new().fg(PLAIN), text.to_string())),
        }
    }
}

impl reedline::Highlighter for Highlighter {
    fn highlight(&self, line: &str, _: usize) -> StyledText {
        let mut output = StyledText::new();
        let mut curr_end = 0;
        for (token, span) in Token::lexer(line).spanned() {
            if curr_end < span.start {
                Self::push_skipped(&mut output, &line[curr_end..span.start]);
            }
            output.push((Style::new().fg(color(&token)), line[span.clone()].to_string()));
            curr_end = span.end;
        }
        if curr_end < line.len() {
            Self::push_skipped(&mut output, &line[curr_end..]);
        }
        output
    }
}

/// Asks for another line while a statement, block or string is still open.
struct Validator;

impl reedline::Validator for Validator {
    fn validate(&self, line: &str) -> ValidationResult {
        if lox_syntax::is_complete(line) {
            ValidationResult::Complete
        } else {
            ValidationResult::Incomplete
        }
    }
}

pub struct Prompt;

impl reedline::Prompt for Prompt {
    fn render_prompt_left(&self) -> Cow<str> {
        Cow::Borrowed(">>> ")
    }

    fn render_prompt_right(&self) -> Cow<str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _: PromptEditMode) -> Cow<str> {
        Cow::Borrowed("")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<str> {
        Cow::Borrowed("... ")
    }

    fn render_prompt_history_search_indicator(&self, _: PromptHistorySearch) -> Cow<str> {
        Cow::Borrowed("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use reedline::Highlighter as _;

    #[test]
    fn highlight_covers_whole_line() {
        let line = r#"var a = "x"; // note"#;
        let styled = Highlighter.highlight(line, 0);
        let text = styled.buffer.iter().map(|(_, text)| text.as_str()).collect::<String>();
        assert_eq!(text, line);

        let (style, text) = styled.buffer.last().unwrap();
        assert_eq!(text, "// note");
        assert_eq!(style.foreground, Some(COMMENT));
    }

    #[test]
    fn keywords_and_literals_are_colored() {
        let styled = Highlighter.highlight("print nil", 0);
        let colors = styled.buffer.iter().map(|(style, _)| style.foreground).collect::<Vec<_>>();
        assert_eq!(colors, vec![Some(KEYWORD), Some(PLAIN), Some(CONSTANT)]);
    }
}
