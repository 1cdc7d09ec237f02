use crate::record::{ImageRecord, ImageViewRecord, PostRecord, SessionRecord, UserRecord};
use ripple_common::model::{
    Id, ModelValidationError,
    image::{Image, ImageMarker, ImageView},
    post::{CreatePost, FEED_PAGE_SIZE, Page, Post, PostMarker},
    session::{Session, SessionTokenHash},
    user::{CreateUser, User, UserMarker},
};
use sqlx::{
    PgPool, Postgres, Transaction, postgres::PgPoolOptions, query, query_as, query_scalar,
};
use std::collections::HashMap;
use thiserror::Error;
use time::{OffsetDateTime, UtcDateTime};

pub type Result<T, E = DbError> = std::result::Result<T, E>;

const FEED_PAGE_LIMIT: i64 = FEED_PAGE_SIZE as i64;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// The feed query engine. Stateless between calls; everything lives in
/// Postgres behind the injected pool.
///
/// Operations that reference another post return `Ok(None)` when the
/// referenced post is missing or soft-deleted, so callers can tell "not
/// found" from a backend failure at the type level.
pub struct DbClient {
    pool: PgPool,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new().connect(database_url).await?;
        Ok(Self::new(pool))
    }

    pub async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let record: UserRecord = query_as(
            "
            INSERT INTO users.users (nickname, image)
            VALUES ($1, $2)
            RETURNING user_id, nickname, image
            ",
        )
        .bind(user.nickname.get())
        .bind(user.image.as_deref())
        .fetch_one(&self.pool)
        .await?;

        Ok(record.try_into()?)
    }

    pub async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record: Option<UserRecord> = query_as(
            "
            SELECT user_id, nickname, image
            FROM users.users
            WHERE user_id = $1
            ",
        )
        .bind(user_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    pub async fn create_session(
        &self,
        user_id: Id<UserMarker>,
        token_hash: &SessionTokenHash,
        expires_at: Option<UtcDateTime>,
    ) -> Result<()> {
        query(
            "
            INSERT INTO users.sessions (token_hash, user_id, expires_at)
            VALUES ($1, $2, $3)
            ",
        )
        .bind(&token_hash.0[..])
        .bind(user_id.get())
        .bind(expires_at.map(OffsetDateTime::from))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn fetch_session(
        &self,
        token_hash: &SessionTokenHash,
    ) -> Result<Option<Session>> {
        let record: Option<SessionRecord> = query_as(
            "
            SELECT token_hash, user_id, created_at, expires_at
            FROM users.sessions
            WHERE token_hash = $1
            ",
        )
        .bind(&token_hash.0[..])
        .fetch_optional(&self.pool)
        .await?;

        let session = record.map(Session::try_from).transpose()?;
        Ok(session)
    }

    /// Creates the post and all of its image rows in one transaction, so
    /// concurrent readers never observe a post without its images.
    pub async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        let mut tx = self.pool.begin().await?;

        let record: PostRecord = query_as(
            "
            INSERT INTO posts.posts (author_id, content)
            VALUES ($1, $2)
            RETURNING post_id, author_id, content, created_at, deleted_at, parent_id, original_id
            ",
        )
        .bind(post.author.get())
        .bind(post.content.get())
        .fetch_one(&mut *tx)
        .await?;

        let images = Self::insert_images(&mut tx, record.post_id, &post.images).await?;
        tx.commit().await?;

        Ok(record.into_post(images, Vec::new())?)
    }

    /// Direct lookup by id, images included. Soft-deleted posts are still
    /// returned here (with `deleted_at` set) even though every listing
    /// excludes them; this is the owner-visibility exception.
    pub async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let record: Option<PostRecord> = query_as(
            "
            SELECT post_id, author_id, content, created_at, deleted_at, parent_id, original_id
            FROM posts.posts
            WHERE post_id = $1
            ",
        )
        .bind(post_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let Some(record) = record else {
            return Ok(None);
        };

        let mut posts = self.attach_relations(vec![record], false).await?;
        Ok(posts.pop())
    }

    pub async fn fetch_feed_page(
        &self,
        cursor: Option<Id<PostMarker>>,
    ) -> Result<Page<Post>> {
        let records: Vec<PostRecord> = query_as(
            "
            SELECT post_id, author_id, content, created_at, deleted_at, parent_id, original_id
            FROM posts.posts
            WHERE deleted_at IS NULL
                AND ($1::BIGINT IS NULL OR post_id < $1)
            ORDER BY created_at DESC, post_id DESC
            LIMIT $2
            ",
        )
        .bind(cursor.map(Id::get))
        .bind(FEED_PAGE_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        let posts = self.attach_relations(records, true).await?;
        Ok(Self::page_from(posts))
    }

    /// Substring search over post content, same ordering and pagination as
    /// the feed. Matching is case-sensitive; `%`, `_` and `\` in the query
    /// match themselves. An empty query matches every post.
    pub async fn search_posts(
        &self,
        search: &str,
        cursor: Option<Id<PostMarker>>,
    ) -> Result<Page<Post>> {
        let records: Vec<PostRecord> = query_as(
            "
            SELECT post_id, author_id, content, created_at, deleted_at, parent_id, original_id
            FROM posts.posts
            WHERE deleted_at IS NULL
                AND ($1::BIGINT IS NULL OR post_id < $1)
                AND content LIKE '%' || $2 || '%'
            ORDER BY created_at DESC, post_id DESC
            LIMIT $3
            ",
        )
        .bind(cursor.map(Id::get))
        .bind(escape_like(search))
        .bind(FEED_PAGE_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        let posts = self.attach_relations(records, true).await?;
        Ok(Self::page_from(posts))
    }

    pub async fn fetch_posts_by_author(
        &self,
        author: Id<UserMarker>,
        cursor: Option<Id<PostMarker>>,
    ) -> Result<Page<Post>> {
        let records: Vec<PostRecord> = query_as(
            "
            SELECT post_id, author_id, content, created_at, deleted_at, parent_id, original_id
            FROM posts.posts
            WHERE deleted_at IS NULL
                AND ($1::BIGINT IS NULL OR post_id < $1)
                AND author_id = $2
            ORDER BY created_at DESC, post_id DESC
            LIMIT $3
            ",
        )
        .bind(cursor.map(Id::get))
        .bind(author.get())
        .bind(FEED_PAGE_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        let posts = self.attach_relations(records, true).await?;
        Ok(Self::page_from(posts))
    }

    /// Marks the post deleted without touching its images, hearts or
    /// children. Returns false when the post is missing or already
    /// deleted.
    pub async fn soft_delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let result = query(
            "
            UPDATE posts.posts
            SET deleted_at = now()
            WHERE post_id = $1 AND deleted_at IS NULL
            ",
        )
        .bind(post_id.get())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Upserts the heart association. Re-adding an existing heart is not
    /// an error and leaves exactly one row.
    pub async fn add_heart(
        &self,
        post_id: Id<PostMarker>,
        user_id: Id<UserMarker>,
    ) -> Result<Option<Post>> {
        if !self.live_post_exists(post_id).await? {
            return Ok(None);
        }

        query(
            "
            INSERT INTO posts.hearts (post_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(post_id.get())
        .bind(user_id.get())
        .execute(&self.pool)
        .await?;

        self.fetch_post(post_id).await
    }

    /// Removing an absent heart is a no-op, not an error.
    pub async fn remove_heart(
        &self,
        post_id: Id<PostMarker>,
        user_id: Id<UserMarker>,
    ) -> Result<Option<Post>> {
        if !self.live_post_exists(post_id).await? {
            return Ok(None);
        }

        query(
            "
            DELETE FROM posts.hearts
            WHERE post_id = $1 AND user_id = $2
            ",
        )
        .bind(post_id.get())
        .bind(user_id.get())
        .execute(&self.pool)
        .await?;

        self.fetch_post(post_id).await
    }

    /// Creates a new post sharing the original. Only the content is
    /// carried over; ids, timestamps and images stay with the original.
    /// The existence check and the insert are one statement, so a post
    /// deleted concurrently simply yields `None`.
    pub async fn create_repost(
        &self,
        post_id: Id<PostMarker>,
        user_id: Id<UserMarker>,
    ) -> Result<Option<Post>> {
        let record: Option<PostRecord> = query_as(
            "
            INSERT INTO posts.posts (author_id, content, original_id)
            SELECT $1, content, post_id
            FROM posts.posts
            WHERE post_id = $2 AND deleted_at IS NULL
            RETURNING post_id, author_id, content, created_at, deleted_at, parent_id, original_id
            ",
        )
        .bind(user_id.get())
        .bind(post_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let post = record
            .map(|record| record.into_post(Vec::new(), Vec::new()))
            .transpose()?;
        Ok(post)
    }

    /// The full comment thread of a post, oldest first. The view is
    /// unbounded: comment counts stay small enough that a page cap would
    /// only complicate thread rendering.
    pub async fn fetch_comments(
        &self,
        post_id: Id<PostMarker>,
    ) -> Result<Option<Vec<Post>>> {
        if !self.live_post_exists(post_id).await? {
            return Ok(None);
        }

        let records: Vec<PostRecord> = query_as(
            "
            SELECT post_id, author_id, content, created_at, deleted_at, parent_id, original_id
            FROM posts.posts
            WHERE parent_id = $1 AND deleted_at IS NULL
            ORDER BY created_at ASC, post_id ASC
            ",
        )
        .bind(post_id.get())
        .fetch_all(&self.pool)
        .await?;

        let posts = self.attach_relations(records, false).await?;
        Ok(Some(posts))
    }

    /// Creates a comment under a live parent, with any attached images in
    /// the same transaction.
    pub async fn create_comment(
        &self,
        parent: Id<PostMarker>,
        comment: &CreatePost,
    ) -> Result<Option<Post>> {
        let mut tx = self.pool.begin().await?;

        let record: Option<PostRecord> = query_as(
            "
            INSERT INTO posts.posts (author_id, content, parent_id)
            SELECT $1, $2, post_id
            FROM posts.posts
            WHERE post_id = $3 AND deleted_at IS NULL
            RETURNING post_id, author_id, content, created_at, deleted_at, parent_id, original_id
            ",
        )
        .bind(comment.author.get())
        .bind(comment.content.get())
        .bind(parent.get())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(record) = record else {
            // dropping the transaction rolls it back
            return Ok(None);
        };

        let images = Self::insert_images(&mut tx, record.post_id, &comment.images).await?;
        tx.commit().await?;

        Ok(Some(record.into_post(images, Vec::new())?))
    }

    /// Restricted projection for a single image: the author's public
    /// profile plus the surrounding post's content and creation time.
    /// `None` when the (image, post) pair does not resolve.
    pub async fn fetch_image_view(
        &self,
        post_id: Id<PostMarker>,
        image_id: Id<ImageMarker>,
    ) -> Result<Option<ImageView>> {
        let record: Option<ImageViewRecord> = query_as(
            "
            SELECT
                u.user_id,
                u.nickname,
                u.image AS user_image,
                p.post_id,
                p.content,
                p.created_at
            FROM posts.images AS i
                JOIN posts.posts AS p ON p.post_id = i.post_id
                JOIN users.users AS u ON u.user_id = p.author_id
            WHERE i.image_id = $1 AND i.post_id = $2
            ",
        )
        .bind(image_id.get())
        .bind(post_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let view = record.map(ImageView::try_from).transpose()?;
        Ok(view)
    }

    async fn live_post_exists(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let exists: bool = query_scalar(
            "
            SELECT EXISTS (
                SELECT 1 FROM posts.posts
                WHERE post_id = $1 AND deleted_at IS NULL
            )
            ",
        )
        .bind(post_id.get())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn insert_images(
        tx: &mut Transaction<'_, Postgres>,
        post_id: i64,
        links: &[String],
    ) -> Result<Vec<Image>> {
        let mut images = Vec::with_capacity(links.len());
        for link in links {
            let record: ImageRecord = query_as(
                "
                INSERT INTO posts.images (post_id, link)
                VALUES ($1, $2)
                RETURNING image_id, post_id, link
                ",
            )
            .bind(post_id)
            .bind(link)
            .fetch_one(&mut **tx)
            .await?;

            images.push(record.into());
        }

        Ok(images)
    }

    /// Batches the related rows for a set of post records: images always,
    /// the ids of live reposts only for the feed views.
    async fn attach_relations(
        &self,
        records: Vec<PostRecord>,
        include_reposts: bool,
    ) -> Result<Vec<Post>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let post_ids: Vec<i64> = records.iter().map(|record| record.post_id).collect();

        let image_records: Vec<ImageRecord> = query_as(
            "
            SELECT image_id, post_id, link
            FROM posts.images
            WHERE post_id = ANY($1)
            ORDER BY image_id
            ",
        )
        .bind(&post_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut images_by_post: HashMap<i64, Vec<Image>> = HashMap::new();
        for record in image_records {
            images_by_post
                .entry(record.post_id)
                .or_default()
                .push(record.into());
        }

        let mut reposts_by_post: HashMap<i64, Vec<Id<PostMarker>>> = HashMap::new();
        if include_reposts {
            let rows: Vec<(i64, i64)> = query_as(
                "
                SELECT original_id, post_id
                FROM posts.posts
                WHERE original_id = ANY($1) AND deleted_at IS NULL
                ORDER BY post_id
                ",
            )
            .bind(&post_ids)
            .fetch_all(&self.pool)
            .await?;

            for (original_id, repost_id) in rows {
                reposts_by_post
                    .entry(original_id)
                    .or_default()
                    .push(repost_id.into());
            }
        }

        records
            .into_iter()
            .map(|record| {
                let images = images_by_post.remove(&record.post_id).unwrap_or_default();
                let reposts = reposts_by_post.remove(&record.post_id).unwrap_or_default();
                record.into_post(images, reposts).map_err(DbError::from)
            })
            .collect()
    }

    fn page_from(posts: Vec<Post>) -> Page<Post> {
        let next_cursor = (posts.len() == FEED_PAGE_SIZE)
            .then(|| posts.last().map(|post| post.id))
            .flatten();

        Page {
            items: posts,
            next_cursor,
        }
    }
}

/// Escapes `LIKE` metacharacters so the search query matches literally.
fn escape_like(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len());
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_common::model::{post::PostContent, session::SessionToken, user::Nickname};
    use time::Duration;

    fn content(text: &str) -> PostContent {
        PostContent::new(text.to_owned()).unwrap()
    }

    async fn create_test_user(db: &DbClient, nickname: &str) -> User {
        db.create_user(&CreateUser {
            nickname: Nickname::new(nickname.to_owned()).unwrap(),
            image: Some(format!("avatars/{nickname}.png")),
        })
        .await
        .unwrap()
    }

    async fn create_simple_post(db: &DbClient, author: &User, text: &str) -> Post {
        db.create_post(&CreatePost {
            author: author.id,
            content: content(text),
            images: Vec::new(),
        })
        .await
        .unwrap()
    }

    async fn heart_count(pool: &PgPool, post_id: Id<PostMarker>) -> i64 {
        query_scalar("SELECT COUNT(*) FROM posts.hearts WHERE post_id = $1")
            .bind(post_id.get())
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test]
    async fn feed_pages_are_descending_capped_and_gap_free(pool: PgPool) {
        let db = DbClient::new(pool);
        let author = create_test_user(&db, "pager").await;

        let mut created_ids = Vec::new();
        for n in 0..25 {
            let post = create_simple_post(&db, &author, &format!("post {n}")).await;
            created_ids.push(post.id);
        }

        let mut seen_ids = Vec::new();
        let mut cursor = None;
        loop {
            let page = db.fetch_feed_page(cursor).await.unwrap();
            assert!(page.items.len() <= FEED_PAGE_SIZE);

            for window in page.items.windows(2) {
                let newer = (window[0].created_at, window[0].id);
                let older = (window[1].created_at, window[1].id);
                assert!(newer > older, "page must be strictly descending");
            }

            if let Some(cursor) = cursor {
                assert!(page.items.iter().all(|post| post.id < cursor));
            }

            seen_ids.extend(page.items.iter().map(|post| post.id));

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        created_ids.sort_unstable();
        created_ids.reverse();
        assert_eq!(seen_ids, created_ids, "pages must partition the feed");
    }

    #[sqlx::test]
    async fn full_final_page_yields_one_empty_page(pool: PgPool) {
        let db = DbClient::new(pool);
        let author = create_test_user(&db, "exact").await;

        for n in 0..FEED_PAGE_SIZE {
            create_simple_post(&db, &author, &format!("post {n}")).await;
        }

        let first = db.fetch_feed_page(None).await.unwrap();
        assert_eq!(first.items.len(), FEED_PAGE_SIZE);
        let last = db.fetch_feed_page(first.next_cursor).await.unwrap();
        assert!(last.items.is_empty());
        assert_eq!(last.next_cursor, None);
    }

    #[sqlx::test]
    async fn soft_deleted_posts_leave_listings_but_not_direct_lookup(pool: PgPool) {
        let db = DbClient::new(pool);
        let author = create_test_user(&db, "deleter").await;
        let post = create_simple_post(&db, &author, "doomed").await;

        assert!(db.soft_delete_post(post.id).await.unwrap());

        let feed = db.fetch_feed_page(None).await.unwrap();
        assert!(feed.items.iter().all(|item| item.id != post.id));

        let by_author = db.fetch_posts_by_author(author.id, None).await.unwrap();
        assert!(by_author.items.is_empty());

        let search = db.search_posts("doomed", None).await.unwrap();
        assert!(search.items.is_empty());

        // direct lookup still resolves, with the deletion visible
        let fetched = db.fetch_post(post.id).await.unwrap().unwrap();
        assert!(fetched.is_deleted());
    }

    #[sqlx::test]
    async fn soft_delete_of_missing_or_deleted_post_reports_not_found(pool: PgPool) {
        let db = DbClient::new(pool);
        let author = create_test_user(&db, "deleter").await;
        let post = create_simple_post(&db, &author, "doomed").await;

        assert!(!db.soft_delete_post(Id::new(9999)).await.unwrap());
        assert!(db.soft_delete_post(post.id).await.unwrap());
        assert!(!db.soft_delete_post(post.id).await.unwrap());
    }

    #[sqlx::test]
    async fn search_is_case_sensitive_substring_match(pool: PgPool) {
        let db = DbClient::new(pool);
        let author = create_test_user(&db, "searcher").await;
        let upper = create_simple_post(&db, &author, "Hello world").await;
        create_simple_post(&db, &author, "hello world").await;

        let result = db.search_posts("Hello", None).await.unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].id, upper.id);

        let everything = db.search_posts("", None).await.unwrap();
        assert_eq!(everything.items.len(), 2);
    }

    #[sqlx::test]
    async fn search_treats_wildcards_literally(pool: PgPool) {
        let db = DbClient::new(pool);
        let author = create_test_user(&db, "wildcard").await;
        let discount = create_simple_post(&db, &author, "save 50% today").await;
        create_simple_post(&db, &author, "save 500 today").await;
        let snake = create_simple_post(&db, &author, "snake_case").await;
        create_simple_post(&db, &author, "snakeXcase").await;

        let percent = db.search_posts("50%", None).await.unwrap();
        assert_eq!(percent.items.len(), 1);
        assert_eq!(percent.items[0].id, discount.id);

        let underscore = db.search_posts("e_c", None).await.unwrap();
        assert_eq!(underscore.items.len(), 1);
        assert_eq!(underscore.items[0].id, snake.id);
    }

    #[sqlx::test]
    async fn author_listing_only_contains_that_authors_posts(pool: PgPool) {
        let db = DbClient::new(pool);
        let alice = create_test_user(&db, "alice").await;
        let bob = create_test_user(&db, "bob").await;
        let hers = create_simple_post(&db, &alice, "from alice").await;
        create_simple_post(&db, &bob, "from bob").await;

        let page = db.fetch_posts_by_author(alice.id, None).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, hers.id);
        assert_eq!(page.items[0].author, alice.id);
    }

    #[sqlx::test]
    async fn hearting_twice_keeps_a_single_association(pool: PgPool) {
        let db = DbClient::new(pool.clone());
        let author = create_test_user(&db, "author").await;
        let fan = create_test_user(&db, "fan").await;
        let post = create_simple_post(&db, &author, "like me").await;

        assert!(db.add_heart(post.id, fan.id).await.unwrap().is_some());
        assert!(db.add_heart(post.id, fan.id).await.unwrap().is_some());
        assert_eq!(heart_count(&pool, post.id).await, 1);
    }

    #[sqlx::test]
    async fn removing_an_absent_heart_is_a_noop(pool: PgPool) {
        let db = DbClient::new(pool.clone());
        let author = create_test_user(&db, "author").await;
        let fan = create_test_user(&db, "fan").await;
        let post = create_simple_post(&db, &author, "like me").await;

        let result = db.remove_heart(post.id, fan.id).await.unwrap();
        assert!(result.is_some());
        assert_eq!(heart_count(&pool, post.id).await, 0);
    }

    #[sqlx::test]
    async fn heart_operations_on_missing_posts_report_not_found(pool: PgPool) {
        let db = DbClient::new(pool);
        let fan = create_test_user(&db, "fan").await;

        assert!(db.add_heart(Id::new(404), fan.id).await.unwrap().is_none());
        assert!(
            db.remove_heart(Id::new(404), fan.id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[sqlx::test]
    async fn repost_links_the_original_and_copies_content_only(pool: PgPool) {
        let db = DbClient::new(pool);
        let author = create_test_user(&db, "author").await;
        let sharer = create_test_user(&db, "sharer").await;
        let original = db
            .create_post(&CreatePost {
                author: author.id,
                content: content("share me"),
                images: vec!["img/one.png".to_owned()],
            })
            .await
            .unwrap();

        let repost = db
            .create_repost(original.id, sharer.id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(repost.original, Some(original.id));
        assert_eq!(repost.author, sharer.id);
        assert_eq!(repost.content, original.content);
        assert!(repost.id > original.id);
        assert_eq!(repost.parent, None);
        assert!(repost.images.is_empty(), "images stay with the original");
        assert!(!repost.is_deleted());
    }

    #[sqlx::test]
    async fn reposting_a_missing_or_deleted_post_reports_not_found(pool: PgPool) {
        let db = DbClient::new(pool);
        let author = create_test_user(&db, "author").await;
        let sharer = create_test_user(&db, "sharer").await;
        let post = create_simple_post(&db, &author, "gone soon").await;

        assert!(
            db.create_repost(Id::new(404), sharer.id)
                .await
                .unwrap()
                .is_none()
        );

        db.soft_delete_post(post.id).await.unwrap();
        assert!(
            db.create_repost(post.id, sharer.id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[sqlx::test]
    async fn comment_threads_are_ascending_unbounded_and_verified(pool: PgPool) {
        let db = DbClient::new(pool);
        let author = create_test_user(&db, "author").await;
        let commenter = create_test_user(&db, "commenter").await;
        let post = create_simple_post(&db, &author, "discuss").await;

        let comment = db
            .create_comment(
                post.id,
                &CreatePost {
                    author: commenter.id,
                    content: content("hi"),
                    images: vec!["img/reaction.png".to_owned()],
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(comment.parent, Some(post.id));
        assert_eq!(comment.images.len(), 1);

        for n in 0..FEED_PAGE_SIZE + 4 {
            db.create_comment(
                post.id,
                &CreatePost {
                    author: commenter.id,
                    content: content(&format!("reply {n}")),
                    images: Vec::new(),
                },
            )
            .await
            .unwrap()
            .unwrap();
        }

        let comments = db.fetch_comments(post.id).await.unwrap().unwrap();
        // no page cap on the thread view
        assert_eq!(comments.len(), FEED_PAGE_SIZE + 5);
        assert_eq!(comments[0].id, comment.id);
        assert_eq!(comments[0].content.get(), "hi");
        for window in comments.windows(2) {
            assert!((window[0].created_at, window[0].id) < (window[1].created_at, window[1].id));
        }
    }

    #[sqlx::test]
    async fn commenting_on_a_missing_parent_reports_not_found(pool: PgPool) {
        let db = DbClient::new(pool);
        let commenter = create_test_user(&db, "commenter").await;

        let result = db
            .create_comment(
                Id::new(404),
                &CreatePost {
                    author: commenter.id,
                    content: content("into the void"),
                    images: Vec::new(),
                },
            )
            .await
            .unwrap();
        assert!(result.is_none());

        assert!(db.fetch_comments(Id::new(404)).await.unwrap().is_none());
    }

    #[sqlx::test]
    async fn created_posts_own_exactly_their_images(pool: PgPool) {
        let db = DbClient::new(pool);
        let alice = create_test_user(&db, "alice").await;
        let bob = create_test_user(&db, "bob").await;

        let hers = db
            .create_post(&CreatePost {
                author: alice.id,
                content: content("two pictures"),
                images: vec!["img/a1.png".to_owned(), "img/a2.png".to_owned()],
            })
            .await
            .unwrap();
        let his = db
            .create_post(&CreatePost {
                author: bob.id,
                content: content("one picture"),
                images: vec!["img/b1.png".to_owned()],
            })
            .await
            .unwrap();

        assert_eq!(hers.images.len(), 2);
        assert!(hers.images.iter().all(|image| image.post == hers.id));
        assert_eq!(
            hers.images.iter().map(|i| i.link.as_str()).collect::<Vec<_>>(),
            ["img/a1.png", "img/a2.png"]
        );

        let refetched = db.fetch_post(his.id).await.unwrap().unwrap();
        assert_eq!(refetched.images.len(), 1);
        assert_eq!(refetched.images[0].link, "img/b1.png");
        assert_eq!(refetched.images[0].post, his.id);
    }

    #[sqlx::test]
    async fn feed_attaches_images_and_live_repost_ids(pool: PgPool) {
        let db = DbClient::new(pool);
        let author = create_test_user(&db, "author").await;
        let sharer = create_test_user(&db, "sharer").await;

        let original = db
            .create_post(&CreatePost {
                author: author.id,
                content: content("popular"),
                images: vec!["img/pic.png".to_owned()],
            })
            .await
            .unwrap();
        let repost = db
            .create_repost(original.id, sharer.id)
            .await
            .unwrap()
            .unwrap();

        let feed = db.fetch_feed_page(None).await.unwrap();
        let feed_original = feed
            .items
            .iter()
            .find(|item| item.id == original.id)
            .unwrap();
        assert_eq!(feed_original.reposts, [repost.id]);
        assert_eq!(feed_original.images.len(), 1);

        db.soft_delete_post(repost.id).await.unwrap();
        let feed = db.fetch_feed_page(None).await.unwrap();
        let feed_original = feed
            .items
            .iter()
            .find(|item| item.id == original.id)
            .unwrap();
        assert!(feed_original.reposts.is_empty());
    }

    #[sqlx::test]
    async fn image_view_projects_author_profile_and_post_fields(pool: PgPool) {
        let db = DbClient::new(pool);
        let author = create_test_user(&db, "photographer").await;
        let post = db
            .create_post(&CreatePost {
                author: author.id,
                content: content("look at this"),
                images: vec!["img/shot.png".to_owned()],
            })
            .await
            .unwrap();
        let other = create_simple_post(&db, &author, "no pictures").await;
        let image = &post.images[0];

        let view = db
            .fetch_image_view(post.id, image.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(view.author.id, author.id);
        assert_eq!(view.author.nickname, author.nickname);
        assert_eq!(view.author.image, author.image);
        assert_eq!(view.post, post.id);
        assert_eq!(view.content, post.content);

        // the pair must resolve together
        let mismatched = db.fetch_image_view(other.id, image.id).await.unwrap();
        assert!(mismatched.is_none());
    }

    #[sqlx::test]
    async fn sessions_round_trip_through_their_hash(pool: PgPool) {
        let db = DbClient::new(pool);
        let user = create_test_user(&db, "sessioned").await;
        let token = SessionToken::generate_random(user.id);
        let hash = token.hash().unwrap();

        db.create_session(user.id, &hash, Some(UtcDateTime::now() + Duration::hours(1)))
            .await
            .unwrap();

        let session = db.fetch_session(&hash).await.unwrap().unwrap();
        assert_eq!(session.user, user.id);
        assert_eq!(session.token_hash, hash);

        let other = SessionToken::generate_random(user.id).hash().unwrap();
        assert!(db.fetch_session(&other).await.unwrap().is_none());
    }

    #[sqlx::test]
    async fn users_are_fetched_by_id(pool: PgPool) {
        let db = DbClient::new(pool);
        let user = create_test_user(&db, "somebody").await;

        let fetched = db.fetch_user(user.id).await.unwrap().unwrap();
        assert_eq!(fetched, user);
        assert!(db.fetch_user(Id::new(404)).await.unwrap().is_none());
    }
}
