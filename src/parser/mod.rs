pub mod answer;
pub mod classify;
pub mod question;
pub mod surgery;

/// Everything extracted from one question folder's two fragment documents.
/// Either side may be absent when the folder lacks that file.
#[derive(Debug, Default)]
pub struct FolderExtract {
    pub question: Option<question::QuestionExtract>,
    pub answer: Option<answer::AnswerExtract>,
}

pub fn parse_fragments(question_html: Option<&str>, answer_html: Option<&str>) -> FolderExtract {
    FolderExtract {
        question: question_html.map(question::extract),
        answer: answer_html.map(answer::extract),
    }
}
