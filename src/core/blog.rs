//! Articles and their authors, categories and tags.

use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, LoaderTrait, ModelTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use tracing::info;

use crate::entities::article::{self, Entity as Article};
use crate::entities::{article_tag, author, category, tag};
use crate::error::{AppError, FieldErrors};
use crate::forms::ArticleFields;
use crate::serializers::{ArticleDetail, ArticleListItem};

/// Published articles, newest first, with their relations.
pub async fn published<C: ConnectionTrait>(db: &C) -> Result<Vec<ArticleListItem>, AppError> {
    let articles = Article::find()
        .filter(article::Column::PubDate.is_not_null())
        .order_by_desc(article::Column::PubDate)
        .order_by_asc(article::Column::Id)
        .all(db)
        .await?;
    let authors = articles.load_one(author::Entity, db).await?;
    let categories = articles.load_one(category::Entity, db).await?;
    let tags = articles
        .load_many_to_many(tag::Entity, article_tag::Entity, db)
        .await?;

    Ok(articles
        .iter()
        .zip(authors)
        .zip(categories)
        .zip(tags)
        .map(|(((found, author), category), mut tags)| {
            tags.sort_by_key(|t| t.id);
            ArticleListItem::new(found, author.as_ref(), category.as_ref(), &tags)
        })
        .collect())
}

pub async fn detail<C: ConnectionTrait>(db: &C, id: i32) -> Result<ArticleDetail, AppError> {
    let found = Article::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("article", id))?;
    let author = found
        .find_related(author::Entity)
        .one(db)
        .await?
        .ok_or_else(|| AppError::Internal(format!("article {id} has no author")))?;
    let category = found
        .find_related(category::Entity)
        .one(db)
        .await?
        .ok_or_else(|| AppError::Internal(format!("article {id} has no category")))?;
    let tags = found
        .find_related(tag::Entity)
        .order_by_asc(tag::Column::Id)
        .all(db)
        .await?;

    Ok(ArticleDetail {
        pk: found.id,
        title: found.title,
        content: found.content,
        pub_date: found.pub_date,
        author,
        category,
        tags,
    })
}

/// Published articles newest first, at most `count` of them when given.
pub async fn latest<C: ConnectionTrait>(
    db: &C,
    count: Option<u64>,
) -> Result<Vec<article::Model>, AppError> {
    let mut select = Article::find()
        .filter(article::Column::PubDate.is_not_null())
        .order_by_desc(article::Column::PubDate);
    if let Some(count) = count {
        select = select.limit(count);
    }
    Ok(select.all(db).await?)
}

pub async fn create_author<C: ConnectionTrait>(
    db: &C,
    name: &str,
    bio: &str,
) -> Result<author::Model, AppError> {
    Ok(author::ActiveModel {
        name: Set(name.to_owned()),
        bio: Set(bio.to_owned()),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

pub async fn create_category<C: ConnectionTrait>(
    db: &C,
    name: &str,
) -> Result<category::Model, AppError> {
    Ok(category::ActiveModel {
        name: Set(name.to_owned()),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

pub async fn create_tag<C: ConnectionTrait>(db: &C, name: &str) -> Result<tag::Model, AppError> {
    Ok(tag::ActiveModel {
        name: Set(name.to_owned()),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

/// Articles for the admin changelist, ordered by title.
pub async fn changelist<C: ConnectionTrait>(db: &C) -> Result<Vec<article::Model>, AppError> {
    Ok(Article::find()
        .order_by_asc(article::Column::Title)
        .order_by_asc(article::Column::Id)
        .all(db)
        .await?)
}

pub async fn create_article(
    db: &DatabaseConnection,
    fields: ArticleFields,
) -> Result<ArticleDetail, AppError> {
    let txn = db.begin().await?;
    check_references(&txn, &fields).await?;
    let inserted = article::ActiveModel {
        title: Set(fields.title),
        content: Set(fields.content),
        pub_date: Set(fields.pub_date),
        author_id: Set(fields.author_id),
        category_id: Set(fields.category_id),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    link_tags(&txn, inserted.id, &fields.tags).await?;
    let created = detail(&txn, inserted.id).await?;
    txn.commit().await?;
    info!(article_id = created.pk, "Article created");
    Ok(created)
}

/// Replaces every field of the article, its tag set included.
pub async fn update_article(
    db: &DatabaseConnection,
    id: i32,
    fields: ArticleFields,
) -> Result<ArticleDetail, AppError> {
    let txn = db.begin().await?;
    let found = Article::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("article", id))?;
    check_references(&txn, &fields).await?;
    let mut active: article::ActiveModel = found.into();
    active.title = Set(fields.title);
    active.content = Set(fields.content);
    active.pub_date = Set(fields.pub_date);
    active.author_id = Set(fields.author_id);
    active.category_id = Set(fields.category_id);
    active.update(&txn).await?;

    article_tag::Entity::delete_many()
        .filter(article_tag::Column::ArticleId.eq(id))
        .exec(&txn)
        .await?;
    link_tags(&txn, id, &fields.tags).await?;
    let updated = detail(&txn, id).await?;
    txn.commit().await?;
    info!(article_id = id, "Article updated");
    Ok(updated)
}

/// Removes the article together with its tag links.
pub async fn delete_article(db: &DatabaseConnection, id: i32) -> Result<(), AppError> {
    let txn = db.begin().await?;
    Article::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("article", id))?;
    delete_articles(&txn, vec![id]).await?;
    txn.commit().await?;
    info!(article_id = id, "Article deleted");
    Ok(())
}

/// Reports author, category and tags that do not exist as field errors.
async fn check_references<C: ConnectionTrait>(
    db: &C,
    fields: &ArticleFields,
) -> Result<(), AppError> {
    let mut errors = FieldErrors::new();
    if author::Entity::find_by_id(fields.author_id).one(db).await?.is_none() {
        errors.insert("author".to_owned(), vec![invalid_choice(fields.author_id)]);
    }
    if category::Entity::find_by_id(fields.category_id)
        .one(db)
        .await?
        .is_none()
    {
        errors.insert("category".to_owned(), vec![invalid_choice(fields.category_id)]);
    }
    if !fields.tags.is_empty() {
        let known: Vec<i32> = tag::Entity::find()
            .filter(tag::Column::Id.is_in(fields.tags.clone()))
            .all(db)
            .await?
            .into_iter()
            .map(|t| t.id)
            .collect();
        let unknown: Vec<String> = fields
            .tags
            .iter()
            .filter(|id| !known.contains(id))
            .map(|id| invalid_choice(*id))
            .collect();
        if !unknown.is_empty() {
            errors.insert("tags".to_owned(), unknown);
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

fn invalid_choice(id: i32) -> String {
    format!("Select a valid choice. {id} is not one of the available choices.")
}

async fn link_tags<C: ConnectionTrait>(db: &C, article_id: i32, tags: &[i32]) -> Result<(), AppError> {
    if tags.is_empty() {
        return Ok(());
    }
    let links = tags.iter().map(|tag_id| article_tag::ActiveModel {
        article_id: Set(article_id),
        tag_id: Set(*tag_id),
    });
    article_tag::Entity::insert_many(links)
        .exec_without_returning(db)
        .await?;
    Ok(())
}

/// Finds the article titled `title` or creates it with the given content and
/// publication date, then links every tag. Returns the article and whether it
/// was created.
pub async fn ensure_article_with_all_tags(
    db: &DatabaseConnection,
    title: &str,
    content: &str,
    pub_date: DateTime<Utc>,
    author_id: i32,
    category_id: i32,
) -> Result<(article::Model, bool), AppError> {
    let txn = db.begin().await?;
    author::Entity::find_by_id(author_id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("author", author_id))?;
    category::Entity::find_by_id(category_id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("category", category_id))?;

    let existing = Article::find()
        .filter(article::Column::Title.eq(title))
        .one(&txn)
        .await?;
    let (found, created) = match existing {
        Some(found) => (found, false),
        None => {
            let inserted = article::ActiveModel {
                title: Set(title.to_owned()),
                content: Set(content.to_owned()),
                pub_date: Set(Some(pub_date)),
                author_id: Set(author_id),
                category_id: Set(category_id),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            (inserted, true)
        }
    };

    let linked: Vec<i32> = article_tag::Entity::find()
        .filter(article_tag::Column::ArticleId.eq(found.id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|link| link.tag_id)
        .collect();
    let links: Vec<article_tag::ActiveModel> = tag::Entity::find()
        .all(&txn)
        .await?
        .into_iter()
        .filter(|t| !linked.contains(&t.id))
        .map(|t| article_tag::ActiveModel {
            article_id: Set(found.id),
            tag_id: Set(t.id),
        })
        .collect();
    if !links.is_empty() {
        article_tag::Entity::insert_many(links)
            .exec_without_returning(&txn)
            .await?;
    }

    txn.commit().await?;
    Ok((found, created))
}

/// Sets `pub_date` on every article whose title contains `fragment`.
pub async fn publish_matching<C: ConnectionTrait>(
    db: &C,
    fragment: &str,
    pub_date: DateTime<Utc>,
) -> Result<u64, AppError> {
    let result = Article::update_many()
        .col_expr(article::Column::PubDate, Expr::value(pub_date))
        .filter(article::Column::Title.contains(fragment))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

async fn delete_articles<C: ConnectionTrait>(db: &C, ids: Vec<i32>) -> Result<(), AppError> {
    if ids.is_empty() {
        return Ok(());
    }
    article_tag::Entity::delete_many()
        .filter(article_tag::Column::ArticleId.is_in(ids.clone()))
        .exec(db)
        .await?;
    Article::delete_many()
        .filter(article::Column::Id.is_in(ids))
        .exec(db)
        .await?;
    Ok(())
}

/// Removes the author and every article they wrote.
pub async fn delete_author(db: &DatabaseConnection, id: i32) -> Result<(), AppError> {
    let txn = db.begin().await?;
    let found = author::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("author", id))?;
    let ids = found
        .find_related(Article)
        .all(&txn)
        .await?
        .into_iter()
        .map(|a| a.id)
        .collect::<Vec<_>>();
    let removed = ids.len();
    delete_articles(&txn, ids).await?;
    found.delete(&txn).await?;
    txn.commit().await?;
    info!(author_id = id, articles = removed, "Author deleted");
    Ok(())
}

/// Removes the category and every article filed under it.
pub async fn delete_category(db: &DatabaseConnection, id: i32) -> Result<(), AppError> {
    let txn = db.begin().await?;
    let found = category::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("category", id))?;
    let ids = found
        .find_related(Article)
        .all(&txn)
        .await?
        .into_iter()
        .map(|a| a.id)
        .collect::<Vec<_>>();
    let removed = ids.len();
    delete_articles(&txn, ids).await?;
    found.delete(&txn).await?;
    txn.commit().await?;
    info!(category_id = id, articles = removed, "Category deleted");
    Ok(())
}
