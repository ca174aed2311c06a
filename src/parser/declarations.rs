//! Declaration parsing: functions and their parameters.

use crate::ast::*;
use crate::error::ParserError;
use crate::lexer::TokenKind;

use super::core::{ParseResult, Parser};

impl Parser {
    /// Only function declarations may appear at the top level.
    pub(crate) fn declaration(&mut self) -> ParseResult<FunctionDecl> {
        if self.check(&TokenKind::Fun) {
            self.function_declaration()
        } else {
            Err(ParserError::unexpected_token(
                "'fun'",
                format!("{}", self.peek().kind),
                self.current_span(),
            ))
        }
    }

    pub(crate) fn function_declaration(&mut self) -> ParseResult<FunctionDecl> {
        let start_span = self.current_span();
        self.expect(&TokenKind::Fun)?;

        let name = self.expect_identifier()?;
        let params = self.parse_parameters()?;
        let return_type = self.parse_optional_annotation()?;

        let body = self.block_statements()?;
        let span = start_span.merge(&self.previous_span());

        Ok(FunctionDecl {
            name,
            params,
            return_type,
            body,
            span,
        })
    }

    fn parse_parameters(&mut self) -> ParseResult<Vec<Parameter>> {
        self.expect(&TokenKind::LeftParen)?;
        let mut params = Vec::new();

        if !self.check(&TokenKind::RightParen) {
            loop {
                let start_span = self.current_span();
                let name = self.expect_identifier()?;
                let type_annotation = self.parse_optional_annotation()?;
                let span = start_span.merge(&self.previous_span());
                params.push(Parameter {
                    name,
                    type_annotation,
                    span,
                });

                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }

        self.expect(&TokenKind::RightParen)?;
        Ok(params)
    }
}
