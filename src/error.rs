use std::io::Cursor;

use argon2::Error as Argon2Error;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use mongodb::error::Error as DbError;
use rocket::{
    http::{ContentType, Status, StatusClass},
    response::Responder,
    serde::json::json,
    Response,
};
use thiserror::Error;

use crate::model::common::election::{CandidateId, ContestId};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    #[error("{1}")]
    Status(Status, String),
    #[error(transparent)]
    Ballot(#[from] BallotError),
}

impl Error {
    /// A 404 for the given missing resource.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::Status(Status::NotFound, format!("{} not found", what.into()))
    }

    /// The HTTP status this error maps to.
    pub fn status(&self) -> Status {
        match self {
            Self::Db(_) => Status::InternalServerError,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
            Self::Argon2(_) => Status::BadRequest,
            Self::Status(status, _) => *status,
            Self::Ballot(err) => err.status(),
        }
    }
}

/// Everything that can go wrong with a ballot submission or the eligibility
/// bookkeeping around it. Every variant carries a message that lets the
/// client distinguish the failure without inspecting the status code alone.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BallotError {
    #[error("Election is not currently accepting votes")]
    ElectionNotVotable,
    #[error("Voter is not eligible to vote in this election")]
    NotEligible,
    #[error("Voter has already voted in this election")]
    AlreadyVoted,
    #[error("Contest {0} does not exist in this election")]
    UnknownContest(ContestId),
    #[error("Candidate '{candidate}' does not exist in contest {contest}")]
    UnknownCandidate {
        contest: ContestId,
        candidate: CandidateId,
    },
    #[error("Too many selections for contest {contest}: got {got}, max {max}")]
    TooManySelections {
        contest: ContestId,
        max: u32,
        got: usize,
    },
    #[error("Candidate '{candidate}' selected more than once in contest {contest}")]
    DuplicateSelection {
        contest: ContestId,
        candidate: CandidateId,
    },
}

impl BallotError {
    /// The HTTP status this error maps to: ineligibility is a permissions
    /// problem, everything else is a bad request.
    pub fn status(&self) -> Status {
        match self {
            Self::NotEligible => Status::Forbidden,
            _ => Status::BadRequest,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    /// Respond with the mapped status code and a JSON body carrying the
    /// distinguishing message, so the client can render the right failure.
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        match status.class() {
            StatusClass::ServerError => error!("{self}"),
            _ => warn!("{self}"),
        }
        let body = json!({ "error": self.to_string() }).to_string();
        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}
