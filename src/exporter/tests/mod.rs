use super::board::{ARCHIVED_FOLDER, create_folders, plan_board};
use super::card::{CardJob, export_card};
use super::test_helpers::{context, test_config};
use super::*;
use crate::config::Credentials;
use crate::types::{
    Action, ActionCard, ActionData, Attachment, BoardRef, Card, CheckItem, Checklist, List,
};
use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};


fn work_board() -> Arc<BoardRef> {
    Arc::new(BoardRef {
        name: "Work".into(),
        short_link: "w1".into(),
    })
}

fn card(id: &str, name: &str, list: &str, pos: f64) -> Card {
    Card {
        id: id.into(),
        name: name.into(),
        id_list: list.into(),
        short_link: format!("s{id}"),
        pos,
        ..Default::default()
    }
}

fn comment_on(card_id: &str, date: &str, text: &str) -> Action {
    Action {
        id: format!("act-{date}"),
        action_type: "commentCard".into(),
        date: date.into(),
        data: ActionData {
            text: text.into(),
            card: Some(ActionCard { id: card_id.into() }),
        },
    }
}

/// A job for a single card in `folder`, with the board reference already set
fn job(card: Card, folder: &std::path::Path) -> CardJob {
    std::fs::create_dir_all(folder).unwrap();
    CardJob {
        slot: 0,
        card: Card {
            board: Some(work_board()),
            ..card
        },
        folder: folder.to_path_buf(),
        checklists: Vec::new(),
        comments: Vec::new(),
    }
}
