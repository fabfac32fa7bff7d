use axum::{
    Extension,
    extract::{Multipart, Path, State},
    response::Json as ResponseJson,
};
use db::models::{
    attachment::{Attachment, CreateAttachment},
    ticket::Ticket,
    user::User,
};
use deployment::Deployment;
use services::services::authorization;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::{ApiError, require},
    routes::{ticket_project, tickets::TicketWithAttachments},
};

/// Accept a single `file` field and store it against the ticket. The file
/// hits the disk first and the record second; a failure in between is
/// rolled back by removing the file again.
pub async fn upload_attachment(
    Extension(ticket): Extension<Ticket>,
    Extension(user): Extension<User>,
    State(deployment): State<DeploymentImpl>,
    mut multipart: Multipart,
) -> Result<ResponseJson<ApiResponse<TicketWithAttachments>>, ApiError> {
    let (_project, access) = ticket_project(&deployment, &ticket).await?;
    require(
        authorization::access_tickets(user.id, &access),
        "Ticket",
        "Not authorized to upload attachments to this ticket",
    )?;

    let mut uploaded: Option<(String, String, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let original_name = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| "upload".to_string());
        let mime_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let data = field.bytes().await?;
        uploaded = Some((original_name, mime_type, data.to_vec()));
        break;
    }

    let Some((original_name, mime_type, data)) = uploaded else {
        return Err(ApiError::BadRequest("No file uploaded".to_string()));
    };

    let stored = deployment.attachment().store(&original_name, &data).await?;

    let created = Attachment::create(
        &deployment.db().pool,
        ticket.id,
        user.id,
        &CreateAttachment {
            filename: stored.filename.clone(),
            original_name,
            mime_type,
            size_bytes: stored.size_bytes,
        },
    )
    .await;

    if let Err(err) = created {
        if let Err(cleanup_err) = deployment.attachment().remove(&stored.filename).await {
            tracing::warn!(
                ticket_id = %ticket.id,
                filename = %stored.filename,
                error = %cleanup_err,
                "Failed to remove stored file after record insert failure"
            );
        }
        return Err(err.into());
    }

    tracing::info!(
        ticket_id = %ticket.id,
        filename = %stored.filename,
        size_bytes = stored.size_bytes,
        "Uploaded attachment"
    );

    let populated = TicketWithAttachments::load(&deployment, ticket).await?;
    Ok(ResponseJson(ApiResponse::success(populated)))
}

/// Remove an attachment: file first, record second. A missing file is
/// logged and the record still goes away.
pub async fn delete_attachment(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<User>,
    Path((ticket_id, attachment_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<TicketWithAttachments>>, ApiError> {
    let ticket = Ticket::find_by_id(&deployment.db().pool, ticket_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Ticket not found".to_string()))?;

    let (_project, access) = ticket_project(&deployment, &ticket).await?;
    require(
        authorization::access_tickets(user.id, &access),
        "Ticket",
        "Not authorized to delete attachments from this ticket",
    )?;

    let attachment = Attachment::find_by_id(&deployment.db().pool, attachment_id)
        .await?
        .filter(|attachment| attachment.ticket_id == ticket.id)
        .ok_or_else(|| ApiError::NotFound("Attachment not found".to_string()))?;

    if let Err(err) = deployment.attachment().remove(&attachment.filename).await {
        tracing::warn!(
            ticket_id = %ticket.id,
            attachment_id = %attachment.id,
            filename = %attachment.filename,
            error = %err,
            "Failed to remove stored attachment file"
        );
    }

    Attachment::delete(&deployment.db().pool, attachment.id).await?;

    let populated = TicketWithAttachments::load(&deployment, ticket).await?;
    Ok(ResponseJson(ApiResponse::success(populated)))
}
