//! Terminal classification prompt

use dialoguer::theme::ColorfulTheme;
use dialoguer::Select;
use treeshift_core::{ChoicePrompt, Classification, PromptError, Summary};
use treeshift_tree::TreePath;

/// Arrow-key selection menu, one question per path
pub(crate) struct TerminalPrompt {
    theme: ColorfulTheme,
}

impl TerminalPrompt {
    pub(crate) fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

fn shape(summary: &Summary) -> String {
    match summary {
        Summary::Null => "null".to_string(),
        Summary::Leaf(kind) => kind.to_string(),
        Summary::Branch(children) => format!("object, {} sampled keys", children.len()),
        Summary::MaxDepth => "not sampled".to_string(),
    }
}

impl ChoicePrompt for TerminalPrompt {
    fn choose(
        &mut self,
        path: &TreePath,
        summary: &Summary,
        options: &[Classification],
    ) -> Result<Classification, PromptError> {
        let key = path.last().unwrap_or("(root)");
        let items: Vec<&str> = options.iter().map(|c| c.label()).collect();
        let picked = Select::with_theme(&self.theme)
            .with_prompt(format!("How should \"{key}\" be treated? ({path}: {})", shape(summary)))
            .items(&items)
            .default(0)
            .interact_opt()
            .map_err(|e| PromptError::Failed(e.to_string()))?;

        picked
            .and_then(|index| options.get(index).copied())
            .ok_or(PromptError::Aborted)
    }
}
