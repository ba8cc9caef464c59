// Copyright (c) The rank-listener Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transfer of assertion results between ranks.
//!
//! Each result travels as six messages, all tagged with the sender's rank:
//!
//! 1. the failed flag (0 or 1)
//! 2. the byte length of the file name
//! 3. the line number
//! 4. the byte length of the summary
//! 5. the file name bytes
//! 6. the summary bytes
//!
//! The receiver posts the two byte receives sized from the lengths it just received, so the field
//! order here must never change.

use crate::{
    config::TextFraming,
    errors::AggregateError,
    harness::AssertionResult,
    substrate::{COORDINATOR, Communicator, Rank, Tag},
};

pub(crate) fn send_result<C: Communicator>(
    comm: &C,
    result: &AssertionResult,
    rank: Rank,
    framing: TextFraming,
) -> Result<(), AggregateError> {
    let tag = rank_tag(rank)?;
    let file_name = framing.encode(result.file_name());
    let summary = framing.encode(result.summary());
    let file_name_len = wire_len("file name", &file_name)?;
    let summary_len = wire_len("summary", &summary)?;

    let send = |value: i32| {
        comm.send_i32(value, COORDINATOR, tag)
            .map_err(AggregateError::substrate("send"))
    };
    send(i32::from(result.failed()))?;
    send(file_name_len)?;
    send(result.line_number())?;
    send(summary_len)?;

    comm.send_bytes(&file_name, COORDINATOR, tag)
        .map_err(AggregateError::substrate("send"))?;
    comm.send_bytes(&summary, COORDINATOR, tag)
        .map_err(AggregateError::substrate("send"))?;
    Ok(())
}

pub(crate) fn recv_result<C: Communicator>(
    comm: &C,
    source: Rank,
    framing: TextFraming,
) -> Result<AssertionResult, AggregateError> {
    let tag = rank_tag(source)?;
    let recv = || {
        comm.recv_i32(source, tag)
            .map_err(AggregateError::substrate("recv"))
    };
    let failed = recv()?;
    let file_name_len = recv()?;
    let line_number = recv()?;
    let summary_len = recv()?;

    let file_name_len = buffer_len(source, "file name", file_name_len)?;
    let summary_len = buffer_len(source, "summary", summary_len)?;

    let file_name = comm
        .recv_bytes(file_name_len, source, tag)
        .map_err(AggregateError::substrate("recv"))?;
    let summary = comm
        .recv_bytes(summary_len, source, tag)
        .map_err(AggregateError::substrate("recv"))?;

    Ok(AssertionResult::new(
        failed != 0,
        framing.decode(&file_name),
        line_number,
        framing.decode(&summary),
    ))
}

fn rank_tag(rank: Rank) -> Result<Tag, AggregateError> {
    Tag::try_from(rank).map_err(|_| AggregateError::FieldTooLong {
        field: "rank tag",
        len: rank,
    })
}

fn wire_len(field: &'static str, bytes: &[u8]) -> Result<i32, AggregateError> {
    i32::try_from(bytes.len()).map_err(|_| AggregateError::FieldTooLong {
        field,
        len: bytes.len(),
    })
}

fn buffer_len(rank: Rank, field: &'static str, length: i32) -> Result<usize, AggregateError> {
    usize::try_from(length).map_err(|_| AggregateError::InvalidLength {
        rank,
        field,
        length,
    })
}
