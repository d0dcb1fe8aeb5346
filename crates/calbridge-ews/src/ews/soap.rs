//! SOAP bodies for the four EWS operations and their response parsers.
//!
//! Requests:
//! - `FindItem` with a `CalendarView` on a distinguished folder
//! - `GetItem` with `AllProperties` plus the calendar fields the
//!   translator needs
//! - `UpdateItem` with one `SetItemField` or `DeleteItemField` per change
//! - `DeleteItem`
//!
//! Every response message carries a `ResponseClass` and a `ResponseCode`;
//! anything but success becomes a [`TransportError`] classified by code.

use calbridge_core::format_canonical;
use chrono::{DateTime, Utc};

use crate::remote::{
    Appointment, AppointmentUpdate, Attendee, CalendarView, ConflictResolution, DeleteMode,
    FieldChange, ITEM_NOT_FOUND_CODES, ItemId, PropertySet, SendCancellations, SendInvitations,
    TransportError, TransportResult, WellKnownFolder,
};

use super::xml::{XmlNode, XmlWriter, parse_document};

pub const SOAP_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const TYPES_NS: &str = "http://schemas.microsoft.com/exchange/services/2006/types";
pub const MESSAGES_NS: &str = "http://schemas.microsoft.com/exchange/services/2006/messages";

/// Calendar fields loaded on top of `AllProperties`.
const ADDITIONAL_FIELDS: &[&str] = &[
    "item:Body",
    "calendar:UID",
    "calendar:Organizer",
    "calendar:RequiredAttendees",
    "calendar:OptionalAttendees",
    "calendar:Resources",
    "calendar:DateTimeStamp",
];

/// Writes the envelope around `body`.
fn envelope<F>(server_version: &str, body: F) -> TransportResult<String>
where
    F: FnOnce(&mut XmlWriter) -> TransportResult<()>,
{
    let mut w = XmlWriter::new()?;
    w.start(
        "soap:Envelope",
        &[
            ("xmlns:soap", SOAP_NS),
            ("xmlns:t", TYPES_NS),
            ("xmlns:m", MESSAGES_NS),
        ],
    )?;
    w.start("soap:Header", &[])?;
    w.empty("t:RequestServerVersion", &[("Version", server_version)])?;
    w.end("soap:Header")?;
    w.start("soap:Body", &[])?;
    body(&mut w)?;
    w.end("soap:Body")?;
    w.end("soap:Envelope")?;
    w.finish()
}

fn write_item_id(w: &mut XmlWriter, id: &ItemId) -> TransportResult<()> {
    match &id.change_key {
        Some(change_key) => w.empty(
            "t:ItemId",
            &[("Id", id.unique_id.as_str()), ("ChangeKey", change_key.as_str())],
        ),
        None => w.empty("t:ItemId", &[("Id", id.unique_id.as_str())]),
    }
}

/// `FindItem` over a calendar view; returns ids only.
pub fn find_item_request(
    server_version: &str,
    folder: WellKnownFolder,
    view: &CalendarView,
) -> TransportResult<String> {
    let max_entries = view.max_entries.to_string();
    let start = format_canonical(&view.start);
    let end = format_canonical(&view.end);

    envelope(server_version, |w| {
        w.start("m:FindItem", &[("Traversal", "Shallow")])?;
        w.start("m:ItemShape", &[])?;
        w.text_element("t:BaseShape", &[], "IdOnly")?;
        w.end("m:ItemShape")?;
        w.empty(
            "m:CalendarView",
            &[
                ("MaxEntriesReturned", max_entries.as_str()),
                ("StartDate", start.as_str()),
                ("EndDate", end.as_str()),
            ],
        )?;
        w.start("m:ParentFolderIds", &[])?;
        w.empty("t:DistinguishedFolderId", &[("Id", folder.as_str())])?;
        w.end("m:ParentFolderIds")?;
        w.end("m:FindItem")
    })
}

/// `GetItem` for one item.
pub fn get_item_request(
    server_version: &str,
    id: &ItemId,
    properties: PropertySet,
) -> TransportResult<String> {
    envelope(server_version, |w| {
        w.start("m:GetItem", &[])?;
        w.start("m:ItemShape", &[])?;
        match properties {
            PropertySet::IdOnly => w.text_element("t:BaseShape", &[], "IdOnly")?,
            PropertySet::FirstClassProperties => {
                w.text_element("t:BaseShape", &[], "AllProperties")?;
                w.text_element("t:BodyType", &[], "Text")?;
                w.start("t:AdditionalProperties", &[])?;
                for &field in ADDITIONAL_FIELDS {
                    w.empty("t:FieldURI", &[("FieldURI", field)])?;
                }
                w.end("t:AdditionalProperties")?;
            }
        }
        w.end("m:ItemShape")?;
        w.start("m:ItemIds", &[])?;
        write_item_id(w, id)?;
        w.end("m:ItemIds")?;
        w.end("m:GetItem")
    })
}

/// `UpdateItem` for one item.
pub fn update_item_request(
    server_version: &str,
    update: &AppointmentUpdate,
    conflict: ConflictResolution,
    invitations: SendInvitations,
) -> TransportResult<String> {
    envelope(server_version, |w| {
        w.start(
            "m:UpdateItem",
            &[
                ("ConflictResolution", conflict.as_str()),
                ("SendMeetingInvitationsOrCancellations", invitations.as_str()),
            ],
        )?;
        w.start("m:ItemChanges", &[])?;
        w.start("t:ItemChange", &[])?;
        write_item_id(w, &update.id)?;
        w.start("t:Updates", &[])?;

        if let Some(change) = &update.subject {
            write_text_change(w, "item:Subject", "t:Subject", &[], change)?;
        }
        if let Some(change) = &update.body {
            write_text_change(w, "item:Body", "t:Body", &[("BodyType", "Text")], change)?;
        }
        if let Some(start) = &update.start {
            write_set_field(w, "calendar:Start", |w| {
                w.text_element("t:Start", &[], &format_canonical(start))
            })?;
        }
        if let Some(end) = &update.end {
            write_set_field(w, "calendar:End", |w| {
                w.text_element("t:End", &[], &format_canonical(end))
            })?;
        }
        if let Some(change) = &update.location {
            write_text_change(w, "calendar:Location", "t:Location", &[], change)?;
        }
        match &update.required_attendees {
            Some(FieldChange::Set(addresses)) if !addresses.is_empty() => {
                write_set_field(w, "calendar:RequiredAttendees", |w| {
                    w.start("t:RequiredAttendees", &[])?;
                    for address in addresses {
                        w.start("t:Attendee", &[])?;
                        w.start("t:Mailbox", &[])?;
                        w.text_element("t:EmailAddress", &[], address)?;
                        w.end("t:Mailbox")?;
                        w.end("t:Attendee")?;
                    }
                    w.end("t:RequiredAttendees")
                })?;
            }
            Some(_) => write_delete_field(w, "calendar:RequiredAttendees")?,
            None => {}
        }

        w.end("t:Updates")?;
        w.end("t:ItemChange")?;
        w.end("m:ItemChanges")?;
        w.end("m:UpdateItem")
    })
}

fn write_text_change(
    w: &mut XmlWriter,
    field_uri: &str,
    element: &str,
    attributes: &[(&str, &str)],
    change: &FieldChange<String>,
) -> TransportResult<()> {
    match change {
        FieldChange::Set(value) => write_set_field(w, field_uri, |w| {
            w.text_element(element, attributes, value)
        }),
        FieldChange::Clear => write_delete_field(w, field_uri),
    }
}

fn write_set_field<F>(w: &mut XmlWriter, field_uri: &str, value: F) -> TransportResult<()>
where
    F: FnOnce(&mut XmlWriter) -> TransportResult<()>,
{
    w.start("t:SetItemField", &[])?;
    w.empty("t:FieldURI", &[("FieldURI", field_uri)])?;
    w.start("t:CalendarItem", &[])?;
    value(w)?;
    w.end("t:CalendarItem")?;
    w.end("t:SetItemField")
}

fn write_delete_field(w: &mut XmlWriter, field_uri: &str) -> TransportResult<()> {
    w.start("t:DeleteItemField", &[])?;
    w.empty("t:FieldURI", &[("FieldURI", field_uri)])?;
    w.end("t:DeleteItemField")
}

/// `DeleteItem` for one item.
pub fn delete_item_request(
    server_version: &str,
    id: &ItemId,
    mode: DeleteMode,
    cancellations: SendCancellations,
) -> TransportResult<String> {
    envelope(server_version, |w| {
        w.start(
            "m:DeleteItem",
            &[
                ("DeleteType", mode.as_str()),
                ("SendMeetingCancellations", cancellations.as_str()),
            ],
        )?;
        w.start("m:ItemIds", &[])?;
        write_item_id(w, id)?;
        w.end("m:ItemIds")?;
        w.end("m:DeleteItem")
    })
}

/// Parses the envelope and returns the single response message, after
/// checking its class.
fn response_message(xml: &str, message: &str) -> TransportResult<XmlNode> {
    let root = parse_document(xml)?;
    if let Some(fault) = root.find("Fault") {
        return Err(fault_to_error(fault));
    }

    let node = root
        .find(message)
        .ok_or_else(|| TransportError::invalid_response(format!("response has no `{}`", message)))?;
    check_response_class(node)?;
    Ok(node.clone())
}

fn check_response_class(node: &XmlNode) -> TransportResult<()> {
    match node.attribute("ResponseClass") {
        Some("Success") | Some("Warning") => Ok(()),
        _ => {
            let code = node.text_at(&["ResponseCode"]).unwrap_or("ErrorInternalServerError");
            let text = node
                .text_at(&["MessageText"])
                .unwrap_or("the service reported an error");
            Err(response_code_error(code, text))
        }
    }
}

/// Maps an EWS response code to a transport error carrying it.
pub fn response_code_error(code: &str, text: &str) -> TransportError {
    if ITEM_NOT_FOUND_CODES.contains(&code) {
        return TransportError::not_found(text).with_response_code(code);
    }
    match code {
        "ErrorAccessDenied" => TransportError::authorization(text).with_response_code(code),
        "ErrorServerBusy" => TransportError::rate_limited(text).with_response_code(code),
        _ => TransportError::service(code, text),
    }
}

/// Extracts a SOAP fault from an error response body.
pub fn parse_fault(xml: &str) -> Option<TransportError> {
    let root = parse_document(xml).ok()?;
    root.find("Fault").map(fault_to_error)
}

fn fault_to_error(fault: &XmlNode) -> TransportError {
    let text = fault
        .text_at(&["faultstring"])
        .unwrap_or("the service returned a SOAP fault");
    match fault.find("ResponseCode").map(|n| n.text.as_str()) {
        Some(code) if !code.is_empty() => response_code_error(code, text),
        _ => TransportError::server(text),
    }
}

/// Parses a `FindItem` response into item ids, in service order.
pub fn parse_find_item_response(xml: &str) -> TransportResult<Vec<ItemId>> {
    let message = response_message(xml, "FindItemResponseMessage")?;
    let items = message
        .path(&["RootFolder", "Items"])
        .ok_or_else(|| TransportError::invalid_response("FindItem response has no items"))?;

    items
        .children
        .iter()
        .map(|item| {
            item.child("ItemId")
                .ok_or_else(|| TransportError::invalid_response("item without `ItemId`"))
                .and_then(parse_item_id)
        })
        .collect()
}

/// Parses a `GetItem` response holding one calendar item.
pub fn parse_get_item_response(xml: &str) -> TransportResult<Appointment> {
    let message = response_message(xml, "GetItemResponseMessage")?;
    let item = message
        .child("Items")
        .and_then(|items| items.children.first())
        .ok_or_else(|| TransportError::invalid_response("GetItem response has no item"))?;

    Ok(Appointment {
        id: item.child("ItemId").map(parse_item_id).transpose()?,
        ical_uid: owned(item.text_at(&["UID"])),
        subject: owned(item.text_at(&["Subject"])),
        start: item.text_at(&["Start"]).map(parse_date_time).transpose()?,
        end: item.text_at(&["End"]).map(parse_date_time).transpose()?,
        body: owned(item.text_at(&["Body"])),
        location: owned(item.text_at(&["Location"])),
        organizer: owned(item.text_at(&["Organizer", "Mailbox", "EmailAddress"])),
        required_attendees: parse_attendees(item.child("RequiredAttendees")),
        optional_attendees: parse_attendees(item.child("OptionalAttendees")),
        resources: parse_attendees(item.child("Resources")),
        date_time_stamp: item
            .text_at(&["DateTimeStamp"])
            .map(parse_date_time)
            .transpose()?,
    })
}

/// Checks an `UpdateItem` response.
pub fn parse_update_item_response(xml: &str) -> TransportResult<()> {
    response_message(xml, "UpdateItemResponseMessage").map(|_| ())
}

/// Checks a `DeleteItem` response.
pub fn parse_delete_item_response(xml: &str) -> TransportResult<()> {
    response_message(xml, "DeleteItemResponseMessage").map(|_| ())
}

fn parse_item_id(node: &XmlNode) -> TransportResult<ItemId> {
    let unique_id = node
        .attribute("Id")
        .filter(|id| !id.is_empty())
        .ok_or_else(|| TransportError::invalid_response("`ItemId` without `Id`"))?;
    let id = ItemId::new(unique_id);
    Ok(match node.attribute("ChangeKey") {
        Some(change_key) => id.with_change_key(change_key),
        None => id,
    })
}

fn parse_attendees(list: Option<&XmlNode>) -> Vec<Attendee> {
    let Some(list) = list else {
        return Vec::new();
    };
    list.children_named("Attendee")
        .filter_map(|attendee| {
            let mailbox = attendee.child("Mailbox")?;
            let address = mailbox.text_at(&["EmailAddress"])?;
            Some(Attendee {
                address: address.to_string(),
                name: owned(mailbox.text_at(&["Name"])),
            })
        })
        .collect()
}

fn parse_date_time(value: &str) -> TransportResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            TransportError::invalid_response(format!("invalid date-time `{}`", value)).with_source(e)
        })
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}
