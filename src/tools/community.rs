use anyhow::Result;

use crate::server::StoryServer;
use crate::types::{Connection, ConnectionStatus, NewConnection, NewQuestion, Question, QuestionFilter};

use super::{invalid, non_blank, parse_role};

impl StoryServer {
    pub async fn do_request_connection(&self, mut new: NewConnection) -> Result<Connection> {
        let mut problems = Vec::new();
        if new.elder_id.trim().is_empty() {
            problems.push("Please choose an elder to connect with.".to_string());
        }
        if new.seeker_id.trim().is_empty() {
            problems.push("Please set up your profile first.".to_string());
        }
        if new.message.trim().is_empty() {
            problems.push("Please enter a message.".to_string());
        }
        if !problems.is_empty() {
            return Err(crate::error::StoreError::Validation(problems).into());
        }

        let store = self.store.lock().await;
        if let Some(story_id) = non_blank(new.story_id.as_deref()) {
            if new.story_title.is_none() {
                new.story_title = store.get_story(story_id)?.map(|s| s.title);
            }
        }
        let id = store.save_connection(new)?;
        tracing::info!("connection {} requested", id);
        store
            .get_connection(&id)?
            .ok_or_else(|| anyhow::anyhow!("connection {} vanished after save", id))
    }

    pub async fn do_respond_to_connection(&self, id: &str, accept: bool) -> Result<Option<Connection>> {
        let status = if accept { ConnectionStatus::Accepted } else { ConnectionStatus::Declined };
        self.store.lock().await.update_connection_status(id, status)
    }

    pub async fn do_list_connections(&self, user_id: &str, role: &str) -> Result<Vec<Connection>> {
        let role = parse_role(role)?;
        self.store.lock().await.connections_for(user_id, role)
    }

    pub async fn do_ask_question(&self, new: NewQuestion) -> Result<Question> {
        if new.question.trim().is_empty() {
            return Err(invalid("Please enter your question."));
        }
        let store = self.store.lock().await;
        let id = store.save_question(new)?;
        store
            .get_question(&id)?
            .ok_or_else(|| anyhow::anyhow!("question {} vanished after save", id))
    }

    pub async fn do_answer_question(
        &self,
        id: &str,
        answer: &str,
        answered_by: &str,
    ) -> Result<Option<Question>> {
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(invalid("Please provide an answer."));
        }
        self.store.lock().await.answer_question(id, answer, answered_by.trim())
    }

    pub async fn do_list_questions(&self, filter: &QuestionFilter) -> Result<Vec<Question>> {
        self.store.lock().await.questions(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::tools::stories::Submission;
    use crate::tools::testing;
    use crate::types::{Category, QuestionStatus};
    use tempfile::TempDir;

    fn request(elder: &str, seeker: &str, message: &str) -> NewConnection {
        NewConnection {
            elder_id: elder.into(),
            seeker_id: seeker.into(),
            seeker_name: "Alex".into(),
            message: message.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn connection_lifecycle() {
        let dir = TempDir::new().unwrap();
        let server = testing::server(&dir);
        let story = server
            .do_share_story(Submission {
                title: "Night shift".into(),
                transcript: Some("thirty years at the hospital".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let mut new = request("elder-1", "seeker-1", "Could we talk about nursing?");
        new.story_id = Some(story.id.clone());
        let pending = server.do_request_connection(new).await.unwrap();
        assert_eq!(pending.status, ConnectionStatus::Pending);
        assert_eq!(pending.story_title.as_deref(), Some("Night shift"));

        let accepted = server.do_respond_to_connection(&pending.id, true).await.unwrap().unwrap();
        assert_eq!(accepted.status, ConnectionStatus::Accepted);
        assert!(server.do_respond_to_connection(&pending.id, false).await.is_err());
        assert!(server.do_respond_to_connection("missing", true).await.unwrap().is_none());

        assert_eq!(server.do_list_connections("elder-1", "elder").await.unwrap().len(), 1);
        assert!(server.do_list_connections("elder-1", "seeker").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_request_lists_every_problem() {
        let dir = TempDir::new().unwrap();
        let server = testing::server(&dir);
        let err = server.do_request_connection(request("", "", " ")).await.unwrap_err();
        match err.downcast_ref::<StoreError>() {
            Some(StoreError::Validation(problems)) => assert_eq!(problems.len(), 3),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn question_is_answered_once() {
        let dir = TempDir::new().unwrap();
        let server = testing::server(&dir);

        assert!(server
            .do_ask_question(NewQuestion { question: "  ".into(), ..Default::default() })
            .await
            .is_err());

        let asked = server
            .do_ask_question(NewQuestion {
                question: "How did you save for a house?".into(),
                category: Category::Finance,
                seeker_id: "seeker-1".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(asked.status, QuestionStatus::Open);
        assert!(asked.elder_id.is_none());

        assert!(server.do_answer_question(&asked.id, "   ", "Rose").await.is_err());
        let answered = server
            .do_answer_question(&asked.id, "A little every week.", "Rose")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(answered.answer.as_deref(), Some("A little every week."));
        assert!(server.do_answer_question("missing", "x", "Rose").await.unwrap().is_none());

        let open = server
            .do_list_questions(&QuestionFilter {
                status: Some(QuestionStatus::Open),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(open.is_empty());
        let finance = server
            .do_list_questions(&QuestionFilter {
                category: Some(Category::Finance),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(finance.len(), 1);
    }
}
