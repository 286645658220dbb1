//! Page views and the admin block editor.

use super::{render, user_facing, FLASH_KEY};
use crate::auth::AdminAccess;
use crate::csrf::{get_csrf_token, CsrfProtectedForm};
use crate::error::AppError;
use crate::state::AppState;
use crate::templates::{AddPageTemplate, BlockFormValues, Chrome, EditPageTemplate, PageTemplate};
use axum::{
    extract::{Form, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use qbrack::pages::markup::render_page;
use qbrack::{DeletedBlock, NewBlock, HOME_PAGE};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_sessions::Session;
use tracing::{info, instrument};

/// Fields of the `/add_page` form; all text so the form can be re-shown as typed
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AddPageForm {
    pub title: String,
    pub page: String,
    pub position: String,
    pub page_order: String,
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateBlockForm {
    pub position: String,
    pub content: String,
}

/// Forms that carry nothing but the CSRF token
#[derive(Debug, Default, Deserialize)]
pub struct EmptyForm {}

/// `GET /`
pub async fn home(State(state): State<AppState>, session: Session) -> Result<Response, AppError> {
    render_named_page(&state, &session, HOME_PAGE).await
}

/// `GET /page/:page`
pub async fn show_page(
    State(state): State<AppState>,
    session: Session,
    Path(page): Path<String>,
) -> Result<Response, AppError> {
    render_named_page(&state, &session, &page).await
}

async fn render_named_page(
    state: &AppState,
    session: &Session,
    page: &str,
) -> Result<Response, AppError> {
    let cms = &state.cms;
    if cms.params.title()?.is_none() {
        return Ok(Redirect::to("/add_page").into_response());
    }

    let blocks = cms.pages.page_contents(page, cms.locale())?;
    let missing = blocks.is_empty() && page != HOME_PAGE;
    let flash = session.get::<String>(FLASH_KEY).await?;
    if flash.is_some() {
        session.remove::<String>(FLASH_KEY).await?;
    }

    let template = PageTemplate {
        chrome: Chrome::load(cms)?,
        page: page.to_string(),
        body_html: render_page(&blocks),
        missing,
        comments: cms.comments.all()?,
        flash,
        csrf_token: get_csrf_token(session).await?,
    };
    let html = render(&template)?;

    if missing {
        Ok((StatusCode::NOT_FOUND, html).into_response())
    } else {
        Ok(html.into_response())
    }
}

/// `GET /pages_list`
pub async fn pages_list(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    Ok(Json(json!({ "pages": state.cms.pages.pages_list()? })))
}

/// `GET /add_page`
pub async fn add_page_form(
    State(state): State<AppState>,
    session: Session,
    _admin: AdminAccess,
) -> Result<Response, AppError> {
    add_page_view(&state, &session, BlockFormValues::default(), None, StatusCode::OK).await
}

async fn add_page_view(
    state: &AppState,
    session: &Session,
    form: BlockFormValues,
    error: Option<String>,
    status: StatusCode,
) -> Result<Response, AppError> {
    let template = AddPageTemplate {
        chrome: Chrome::load(&state.cms)?,
        untitled: state.cms.params.title()?.is_none(),
        form,
        error,
        csrf_token: get_csrf_token(session).await?,
    };
    Ok((status, render(&template)?).into_response())
}

/// `POST /add_page`: stores the site title on first run, otherwise adds a block
#[instrument(skip_all)]
pub async fn add_page_submit(
    State(state): State<AppState>,
    session: Session,
    _admin: AdminAccess,
    Form(form): Form<CsrfProtectedForm<AddPageForm>>,
) -> Result<Response, AppError> {
    let form = form.verify(&session).await?;
    let cms = &state.cms;
    let values = BlockFormValues {
        page: form.page.trim().to_string(),
        position: form.position.trim().to_string(),
        page_order: form.page_order.trim().to_string(),
        content: form.content.trim().to_string(),
    };

    if cms.params.title()?.is_none() {
        if let Err(e) = cms.params.set_title(&form.title) {
            let message = user_facing(&e).ok_or(e)?;
            return add_page_view(&state, &session, values, Some(message), StatusCode::BAD_REQUEST)
                .await;
        }
        if values.page.is_empty() && values.content.is_empty() {
            return Ok(Redirect::to("/add_page").into_response());
        }
    }

    let block = match parse_new_block(&values, cms.locale()) {
        Ok(block) => block,
        Err(code) => {
            return add_page_view(
                &state,
                &session,
                values,
                Some(code.to_string()),
                StatusCode::BAD_REQUEST,
            )
            .await
        }
    };

    match cms.pages.add_block(&block) {
        Ok(id) => {
            info!(block_id = id, "block added from web");
            Ok(Redirect::to(&format!("/page/{}", block.page)).into_response())
        }
        Err(e) => {
            let message = user_facing(&e).ok_or(e)?;
            add_page_view(&state, &session, values, Some(message), StatusCode::BAD_REQUEST).await
        }
    }
}

fn parse_new_block(values: &BlockFormValues, locale: &str) -> Result<NewBlock, &'static str> {
    let position = values
        .position
        .parse::<u32>()
        .map_err(|_| "POSITION_INVALID")?;
    let page_order = if values.page_order.is_empty() {
        0
    } else {
        values
            .page_order
            .parse::<u32>()
            .map_err(|_| "PAGE_ORDER_INVALID")?
    };
    Ok(NewBlock {
        page: values.page.clone(),
        locale: locale.to_string(),
        position,
        page_order,
        content: values.content.clone(),
    })
}

/// `POST /del_page/:id`: deletes a single block
pub async fn del_page(
    State(state): State<AppState>,
    session: Session,
    _admin: AdminAccess,
    Path(block_id): Path<i64>,
    Form(form): Form<CsrfProtectedForm<EmptyForm>>,
) -> Result<Json<DeletedBlock>, AppError> {
    form.verify(&session).await?;
    Ok(Json(state.cms.pages.delete_block(block_id)?))
}

/// `GET /edit_page/:page`
pub async fn edit_page(
    State(state): State<AppState>,
    session: Session,
    _admin: AdminAccess,
    Path(page): Path<String>,
) -> Result<Response, AppError> {
    edit_page_view(&state, &session, &page, None, StatusCode::OK).await
}

async fn edit_page_view(
    state: &AppState,
    session: &Session,
    page: &str,
    error: Option<String>,
    status: StatusCode,
) -> Result<Response, AppError> {
    let template = EditPageTemplate {
        chrome: Chrome::load(&state.cms)?,
        page: page.to_string(),
        blocks: state.cms.pages.blocks_for_page(page, state.cms.locale())?,
        error,
        csrf_token: get_csrf_token(session).await?,
    };
    Ok((status, render(&template)?).into_response())
}

/// The block must exist and belong to the page in the URL
fn ensure_block_on_page(state: &AppState, page: &str, block_id: i64) -> Result<(), AppError> {
    match state.cms.pages.block(block_id)? {
        Some(block) if block.page == page => Ok(()),
        _ => Err(qbrack::QbrackError::not_found(format!("block {block_id} on page {page}")).into()),
    }
}

/// `POST /edit_page/:page/block/:id`
pub async fn update_block(
    State(state): State<AppState>,
    session: Session,
    _admin: AdminAccess,
    Path((page, block_id)): Path<(String, i64)>,
    Form(form): Form<CsrfProtectedForm<UpdateBlockForm>>,
) -> Result<Response, AppError> {
    let form = form.verify(&session).await?;
    ensure_block_on_page(&state, &page, block_id)?;

    let Ok(position) = form.position.trim().parse::<u32>() else {
        return edit_page_view(
            &state,
            &session,
            &page,
            Some("POSITION_INVALID".to_string()),
            StatusCode::BAD_REQUEST,
        )
        .await;
    };

    match state
        .cms
        .pages
        .update_block(block_id, position, form.content.trim())
    {
        Ok(()) => Ok(Redirect::to(&format!("/edit_page/{page}")).into_response()),
        Err(e) => {
            let message = user_facing(&e).ok_or(e)?;
            edit_page_view(&state, &session, &page, Some(message), StatusCode::BAD_REQUEST).await
        }
    }
}

/// `POST /edit_page/:page/block/:id/delete`
pub async fn delete_block(
    State(state): State<AppState>,
    session: Session,
    _admin: AdminAccess,
    Path((page, block_id)): Path<(String, i64)>,
    Form(form): Form<CsrfProtectedForm<EmptyForm>>,
) -> Result<Redirect, AppError> {
    form.verify(&session).await?;
    ensure_block_on_page(&state, &page, block_id)?;
    state.cms.pages.delete_block(block_id)?;
    Ok(Redirect::to(&format!("/edit_page/{page}")))
}

/// `POST /edit_page/:page/delete`
pub async fn delete_page(
    State(state): State<AppState>,
    session: Session,
    _admin: AdminAccess,
    Path(page): Path<String>,
    Form(form): Form<CsrfProtectedForm<EmptyForm>>,
) -> Result<Redirect, AppError> {
    form.verify(&session).await?;
    let removed = state.cms.pages.delete_page(&page)?;
    info!(page = %page, removed, "page deleted from web");
    Ok(Redirect::to("/"))
}
