// Few-shot moderation prompt sent for every cleaned post.

/// Build the labeling prompt for one post title.
pub fn build_prompt(text: &str) -> String {
    format!(
        r#"
You are a content moderation AI. Your task is to detect cyberhate in social media comments.

Cyberhate includes:
- Direct or indirect harassment
- Personal insults or threats
- Hate speech (racial, gendered, religious slurs)
- Abusive, degrading, or harmful language

Neutral or harmless comments should be marked as not cyberhate.

Your output must be one of:
- 1 → Cyberhate
- 0 → Not Cyberhate

Do not explain or justify. Reply with ONLY the number 0 or 1.

### Examples:

Comment: "You're disgusting. No one wants you here."
CyberHate: 1

Comment: "I think cats are better than dogs."
CyberHate: 0

Comment: "Just shut up already, idiot."
CyberHate: 1

Comment: "This article made my day!"
CyberHate: 0

Comment: "{text}"
CyberHate:"#
    )
}
