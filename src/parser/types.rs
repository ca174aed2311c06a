//! Type annotation parsing.

use crate::ast::*;
use crate::error::ParserError;
use crate::lexer::TokenKind;

use super::core::{ParseResult, Parser};

impl Parser {
    pub(crate) fn parse_type(&mut self) -> ParseResult<TypeAnnotation> {
        let span = self.current_span();
        let kind = match &self.peek().kind {
            TokenKind::Int => TypeKind::Int,
            TokenKind::Double => TypeKind::Double,
            TokenKind::Void => TypeKind::Void,
            TokenKind::Eof => return Err(ParserError::unexpected_eof(span)),
            other => {
                return Err(ParserError::unexpected_token(
                    "type",
                    format!("{}", other),
                    span,
                ))
            }
        };
        self.advance();
        Ok(TypeAnnotation::new(kind, span))
    }

    /// `: type`, if present.
    pub(crate) fn parse_optional_annotation(&mut self) -> ParseResult<Option<TypeAnnotation>> {
        if self.match_token(&TokenKind::Colon) {
            Ok(Some(self.parse_type()?))
        } else {
            Ok(None)
        }
    }
}
