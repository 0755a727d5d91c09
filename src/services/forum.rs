use crate::error::{AppError, Result};
use crate::models::{
    Comment, CreateCommentRequest, CreatePostRequest, ForumPost, PostEvent, UserInfo,
};
use sqlx::PgPool;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Events kept for laggy SSE subscribers before they start missing some.
const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, serde::Serialize)]
pub struct LikeStatus {
    pub post_id: Uuid,
    pub liked: bool,
    pub like_count: i64,
}

/// Forum posts, likes and comments, with change notifications fanned out to
/// every subscriber after each successful write.
pub struct ForumService {
    db: PgPool,
    events: broadcast::Sender<PostEvent>,
}

impl ForumService {
    pub fn new(db: PgPool) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self { db, events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PostEvent> {
        self.events.subscribe()
    }

    /// Newest-first listing with like/comment counts. `viewer` marks which
    /// posts the caller already liked; anonymous readers get `false`.
    pub async fn list_posts(&self, viewer: Option<Uuid>) -> Result<Vec<ForumPost>> {
        let posts = sqlx::query_as::<_, ForumPost>(
            r#"
            SELECT p.id, p.user_id, p.author_name, p.title, p.content, p.category, p.created_at,
                   (SELECT COUNT(*) FROM post_likes l WHERE l.post_id = p.id) AS like_count,
                   (SELECT COUNT(*) FROM post_comments c WHERE c.post_id = p.id) AS comment_count,
                   EXISTS(
                       SELECT 1 FROM post_likes l
                       WHERE l.post_id = p.id AND l.user_id = $1
                   ) AS liked_by_me
            FROM forum_posts p
            ORDER BY p.created_at DESC
            "#,
        )
        .bind(viewer)
        .fetch_all(&self.db)
        .await?;

        Ok(posts)
    }

    pub async fn create_post(&self, author: &UserInfo, req: CreatePostRequest) -> Result<ForumPost> {
        let post = sqlx::query_as::<_, ForumPost>(
            r#"
            INSERT INTO forum_posts (user_id, author_name, title, content, category)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, author_name, title, content, category, created_at,
                      0::bigint AS like_count, 0::bigint AS comment_count, false AS liked_by_me
            "#,
        )
        .bind(author.id)
        .bind(&author.username)
        .bind(&req.title)
        .bind(&req.content)
        .bind(&req.category)
        .fetch_one(&self.db)
        .await?;

        tracing::info!("Forum post created: {} by {}", post.id, author.username);
        self.notify(PostEvent::PostCreated { post_id: post.id });

        Ok(post)
    }

    /// Like if not yet liked, unlike otherwise.
    pub async fn toggle_like(&self, post_id: Uuid, user_id: Uuid) -> Result<LikeStatus> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM forum_posts WHERE id = $1)")
                .bind(post_id)
                .fetch_one(&self.db)
                .await?;

        if !exists {
            return Err(AppError::NotFound("Post not found".to_string()));
        }

        let deleted = sqlx::query("DELETE FROM post_likes WHERE post_id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(user_id)
            .execute(&self.db)
            .await?
            .rows_affected();

        let liked = if deleted == 0 {
            sqlx::query("INSERT INTO post_likes (post_id, user_id) VALUES ($1, $2)")
                .bind(post_id)
                .bind(user_id)
                .execute(&self.db)
                .await?;
            true
        } else {
            false
        };

        let like_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM post_likes WHERE post_id = $1")
                .bind(post_id)
                .fetch_one(&self.db)
                .await?;

        self.notify(PostEvent::LikeToggled {
            post_id,
            liked,
            like_count,
        });

        Ok(LikeStatus {
            post_id,
            liked,
            like_count,
        })
    }

    pub async fn list_comments(&self, post_id: Uuid) -> Result<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(
            "SELECT * FROM post_comments WHERE post_id = $1 ORDER BY created_at ASC",
        )
        .bind(post_id)
        .fetch_all(&self.db)
        .await?;

        Ok(comments)
    }

    pub async fn add_comment(
        &self,
        post_id: Uuid,
        author: &UserInfo,
        req: CreateCommentRequest,
    ) -> Result<Comment> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM forum_posts WHERE id = $1)")
                .bind(post_id)
                .fetch_one(&self.db)
                .await?;

        if !exists {
            return Err(AppError::NotFound("Post not found".to_string()));
        }

        let comment = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO post_comments (post_id, user_id, author_name, content)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(post_id)
        .bind(author.id)
        .bind(&author.username)
        .bind(&req.content)
        .fetch_one(&self.db)
        .await?;

        self.notify(PostEvent::CommentAdded {
            post_id,
            comment_id: comment.id,
        });

        Ok(comment)
    }

    fn notify(&self, event: PostEvent) {
        // Nobody listening is fine; SSE subscribers come and go.
        let _ = self.events.send(event);
    }
}
