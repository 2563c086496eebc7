// src/frontend/parser.rs

use crate::errors::ParserError;
use crate::frontend::{Interner, Lexer, Span, Token, TokenType, ast::*};

pub struct Parser<'src, 'i> {
    lexer: Lexer<'src>,
    current: Token,
    previous: Token,
    interner: &'i mut Interner,
}

impl<'src, 'i> Parser<'src, 'i> {
    pub fn new(source: &'src str, interner: &'i mut Interner) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        Self {
            lexer,
            current,
            previous: Token::new(TokenType::Eof, "", Span::default()),
            interner,
        }
    }

    pub fn parse_file(&mut self) -> Result<File, ParserError> {
        let start = self.current.span;
        let mut elements = Vec::new();
        self.skip_semicolons();
        while !self.check(TokenType::Eof) {
            elements.push(self.element()?);
            self.skip_semicolons();
        }
        let span = start.merge(self.previous.span);
        Ok(File { elements, span })
    }

    fn element(&mut self) -> Result<Element, ParserError> {
        let is_type_def = matches!(
            self.current.ty,
            TokenType::KwClass
                | TokenType::KwStruct
                | TokenType::KwImpl
                | TokenType::KwEnum
                | TokenType::KwType
        ) || (self.current.ty == TokenType::KwPub);
        if is_type_def {
            Ok(Element::TypeDef(self.type_def()?))
        } else {
            Ok(Element::Expr(self.expression()?))
        }
    }

    // ------------------------------------------------------------------
    // Type definitions
    // ------------------------------------------------------------------

    fn type_def(&mut self) -> Result<TypeDefDecl, ParserError> {
        let start = self.current.span;
        let public = self.match_token(TokenType::KwPub);
        match self.current.ty {
            TokenType::KwClass => self.class_decl(public, start),
            TokenType::KwStruct => self.struct_decl(public, start),
            TokenType::KwEnum => self.enum_decl(public, start),
            TokenType::KwType => self.alias_decl(public, start),
            TokenType::KwImpl => self.impl_block(start),
            _ => Err(self.unexpected("expected a type definition")),
        }
    }

    fn class_decl(&mut self, public: bool, start: Span) -> Result<TypeDefDecl, ParserError> {
        self.advance(); // class
        let name = self.identifier("class name")?;
        let generics = self.generic_params()?;
        let supertype = if self.match_token(TokenType::Colon) {
            Some(self.type_expr()?)
        } else {
            None
        };
        let (fields, methods) = self.type_body()?;
        let span = start.merge(self.previous.span);
        Ok(TypeDefDecl {
            kind: TypeDefDeclKind::Class(ClassDecl {
                public,
                name,
                generics,
                supertype,
                fields,
                methods,
                span,
            }),
            span,
        })
    }

    fn struct_decl(&mut self, public: bool, start: Span) -> Result<TypeDefDecl, ParserError> {
        self.advance(); // struct
        let name = self.identifier("struct name")?;
        let generics = self.generic_params()?;
        let (fields, methods) = self.type_body()?;
        let span = start.merge(self.previous.span);
        Ok(TypeDefDecl {
            kind: TypeDefDeclKind::Struct(StructDecl {
                public,
                name,
                generics,
                fields,
                methods,
                span,
            }),
            span,
        })
    }

    fn enum_decl(&mut self, public: bool, start: Span) -> Result<TypeDefDecl, ParserError> {
        self.advance(); // enum
        let name = self.identifier("enum name")?;
        self.consume(TokenType::LBrace, "'{'")?;
        let mut variants = Vec::new();
        if !self.check(TokenType::RBrace) {
            loop {
                variants.push(self.identifier("variant name")?);
                if !self.match_token(TokenType::Comma) {
                    break;
                }
                if self.check(TokenType::RBrace) {
                    break; // trailing comma
                }
            }
        }
        self.consume(TokenType::RBrace, "'}'")?;
        let span = start.merge(self.previous.span);
        Ok(TypeDefDecl {
            kind: TypeDefDeclKind::Enum(EnumDecl {
                public,
                name,
                variants,
                span,
            }),
            span,
        })
    }

    fn alias_decl(&mut self, public: bool, start: Span) -> Result<TypeDefDecl, ParserError> {
        self.advance(); // type
        let name = self.identifier("alias name")?;
        self.consume(TokenType::Eq, "'='")?;
        let target = self.type_expr()?;
        let span = start.merge(self.previous.span);
        Ok(TypeDefDecl {
            kind: TypeDefDeclKind::Alias(AliasDecl {
                public,
                name,
                target,
                span,
            }),
            span,
        })
    }

    fn impl_block(&mut self, start: Span) -> Result<TypeDefDecl, ParserError> {
        self.advance(); // impl
        let target = self.type_expr()?;
        self.consume(TokenType::LBrace, "'{'")?;
        let mut methods = Vec::new();
        while !self.check(TokenType::RBrace) && !self.check(TokenType::Eof) {
            let member_start = self.current.span;
            let public = self.match_token(TokenType::KwPub);
            let is_static = self.match_token(TokenType::KwStatic);
            let is_const = self.match_token(TokenType::KwConst);
            methods.push(self.method_decl(public, is_static, is_const, member_start)?);
        }
        self.consume(TokenType::RBrace, "'}'")?;
        let span = start.merge(self.previous.span);
        Ok(TypeDefDecl {
            kind: TypeDefDeclKind::Impl(ImplBlock {
                target,
                methods,
                span,
            }),
            span,
        })
    }

    /// Parse the `{ fields and methods }` body shared by classes and structs
    fn type_body(&mut self) -> Result<(Vec<FieldDecl>, Vec<MethodDecl>), ParserError> {
        self.consume(TokenType::LBrace, "'{'")?;
        let mut fields = Vec::new();
        let mut methods = Vec::new();
        while !self.check(TokenType::RBrace) && !self.check(TokenType::Eof) {
            let member_start = self.current.span;
            let public = self.match_token(TokenType::KwPub);
            let is_static = self.match_token(TokenType::KwStatic);
            let is_const = self.match_token(TokenType::KwConst);
            if self.check(TokenType::KwFn) {
                methods.push(self.method_decl(public, is_static, is_const, member_start)?);
            } else {
                let name = self.identifier("field name")?;
                self.consume(TokenType::Colon, "':'")?;
                let ty = self.type_expr()?;
                let span = member_start.merge(self.previous.span);
                fields.push(FieldDecl {
                    public,
                    is_static,
                    name,
                    ty,
                    span,
                });
                self.skip_semicolons();
            }
        }
        self.consume(TokenType::RBrace, "'}'")?;
        Ok((fields, methods))
    }

    fn method_decl(
        &mut self,
        public: bool,
        is_static: bool,
        is_const: bool,
        start: Span,
    ) -> Result<MethodDecl, ParserError> {
        self.consume(TokenType::KwFn, "'fn'")?;
        // Constructors are written `fn new(...)`, so the keyword doubles as
        // a method name here
        let name = if self.check(TokenType::KwNew) {
            self.advance();
            self.interner.intern("new")
        } else {
            self.identifier("method name")?
        };
        let generics = self.generic_params()?;
        self.consume(TokenType::LParen, "'('")?;
        let mut params = Vec::new();
        if !self.check(TokenType::RParen) {
            loop {
                params.push(self.pattern()?);
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenType::RParen, "')'")?;
        let return_type = if self.match_token(TokenType::Colon) {
            Some(self.type_expr()?)
        } else {
            None
        };
        let body = self.expression()?;
        let span = start.merge(self.previous.span);
        Ok(MethodDecl {
            public,
            is_static,
            is_const,
            name,
            generics,
            params,
            return_type,
            body,
            span,
        })
    }

    fn generic_params(&mut self) -> Result<Vec<Symbol>, ParserError> {
        let mut generics = Vec::new();
        if self.match_token(TokenType::Lt) {
            loop {
                generics.push(self.identifier("type parameter")?);
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
            self.consume(TokenType::Gt, "'>'")?;
        }
        Ok(generics)
    }

    // ------------------------------------------------------------------
    // Patterns and types
    // ------------------------------------------------------------------

    fn pattern(&mut self) -> Result<Pattern, ParserError> {
        let start = self.current.span;
        let inner = if self.match_token(TokenType::LParen) {
            let mut parts = Vec::new();
            if !self.check(TokenType::RParen) {
                loop {
                    parts.push(self.pattern()?);
                    if !self.match_token(TokenType::Comma) {
                        break;
                    }
                }
            }
            self.consume(TokenType::RParen, "')'")?;
            let span = start.merge(self.previous.span);
            if parts.len() == 1 {
                parts.into_iter().next().unwrap()
            } else {
                Pattern {
                    kind: PatternKind::Tuple(parts),
                    span,
                }
            }
        } else {
            let name = self.identifier("binding name")?;
            Pattern {
                kind: PatternKind::Binding(name),
                span: self.previous.span,
            }
        };

        if self.match_token(TokenType::Colon) {
            let ty = self.type_expr()?;
            let span = start.merge(self.previous.span);
            Ok(Pattern {
                kind: PatternKind::Typed(Box::new(inner), ty),
                span,
            })
        } else {
            Ok(inner)
        }
    }

    fn type_expr(&mut self) -> Result<TypeExpr, ParserError> {
        let start = self.current.span;
        if self.match_token(TokenType::LParen) {
            let mut parts = Vec::new();
            if !self.check(TokenType::RParen) {
                loop {
                    parts.push(self.type_expr()?);
                    if !self.match_token(TokenType::Comma) {
                        break;
                    }
                }
            }
            self.consume(TokenType::RParen, "')'")?;
            let span = start.merge(self.previous.span);
            if parts.len() == 1 {
                return Ok(parts.into_iter().next().unwrap());
            }
            return Ok(TypeExpr {
                kind: TypeExprKind::Tuple(parts),
                span,
            });
        }
        if self.match_token(TokenType::KwFn) {
            self.consume(TokenType::LParen, "'('")?;
            let mut params = Vec::new();
            if !self.check(TokenType::RParen) {
                loop {
                    params.push(self.type_expr()?);
                    if !self.match_token(TokenType::Comma) {
                        break;
                    }
                }
            }
            self.consume(TokenType::RParen, "')'")?;
            let ret = if self.match_token(TokenType::Colon) {
                Some(Box::new(self.type_expr()?))
            } else {
                None
            };
            let span = start.merge(self.previous.span);
            return Ok(TypeExpr {
                kind: TypeExprKind::Func(params, ret),
                span,
            });
        }
        let name = self.identifier("type name")?;
        let mut args = Vec::new();
        if self.match_token(TokenType::Lt) {
            loop {
                args.push(self.type_expr()?);
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
            self.consume(TokenType::Gt, "'>'")?;
        }
        let span = start.merge(self.previous.span);
        Ok(TypeExpr {
            kind: TypeExprKind::Named(name, args),
            span,
        })
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expression(&mut self) -> Result<Expr, ParserError> {
        let expr = self.postfix_expr()?;
        if self.match_token(TokenType::Eq) {
            let value = self.expression()?;
            let span = expr.span.merge(value.span);
            return Ok(Expr {
                kind: ExprKind::Assignment {
                    target: Box::new(expr),
                    value: Box::new(value),
                },
                span,
            });
        }
        Ok(expr)
    }

    fn postfix_expr(&mut self) -> Result<Expr, ParserError> {
        let mut expr = self.primary()?;
        loop {
            if self.match_token(TokenType::Dot) {
                let name = self.identifier("member name")?;
                let mut generic_args = Vec::new();
                if self.check(TokenType::ColonColon) {
                    self.advance();
                    self.consume(TokenType::Lt, "'<'")?;
                    loop {
                        generic_args.push(self.type_expr()?);
                        if !self.match_token(TokenType::Comma) {
                            break;
                        }
                    }
                    self.consume(TokenType::Gt, "'>'")?;
                }
                if self.check(TokenType::LParen) || !generic_args.is_empty() {
                    let args = self.call_args()?;
                    let span = expr.span.merge(self.previous.span);
                    expr = if matches!(expr.kind, ExprKind::Super) {
                        Expr {
                            kind: ExprKind::SuperCall { name, args },
                            span,
                        }
                    } else {
                        Expr {
                            kind: ExprKind::MethodCall {
                                receiver: Box::new(expr),
                                name,
                                generic_args,
                                args,
                            },
                            span,
                        }
                    };
                } else {
                    let span = expr.span.merge(self.previous.span);
                    if matches!(expr.kind, ExprKind::Super) {
                        return Err(ParserError::UnexpectedSuper { span: span.into() });
                    }
                    expr = Expr {
                        kind: ExprKind::FieldAccess {
                            receiver: Box::new(expr),
                            name,
                        },
                        span,
                    };
                }
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn call_args(&mut self) -> Result<Vec<Expr>, ParserError> {
        self.consume(TokenType::LParen, "'('")?;
        let mut args = Vec::new();
        if !self.check(TokenType::RParen) {
            loop {
                args.push(self.expression()?);
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenType::RParen, "')'")?;
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr, ParserError> {
        let start = self.current.span;
        match self.current.ty {
            TokenType::IntLiteral => {
                let value = self.current.lexeme.parse::<i64>().unwrap_or(0);
                self.advance();
                Ok(Expr {
                    kind: ExprKind::IntLiteral(value),
                    span: start,
                })
            }
            TokenType::FloatLiteral => {
                let value = self.current.lexeme.parse::<f64>().unwrap_or(0.0);
                self.advance();
                Ok(Expr {
                    kind: ExprKind::FloatLiteral(value),
                    span: start,
                })
            }
            TokenType::StringLiteral => {
                let value = self.current.lexeme.clone();
                self.advance();
                Ok(Expr {
                    kind: ExprKind::StringLiteral(value),
                    span: start,
                })
            }
            TokenType::KwTrue => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::BoolLiteral(true),
                    span: start,
                })
            }
            TokenType::KwFalse => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::BoolLiteral(false),
                    span: start,
                })
            }
            TokenType::Identifier => {
                let name = self.interner.intern(&self.current.lexeme);
                self.advance();
                Ok(Expr {
                    kind: ExprKind::Variable(name),
                    span: start,
                })
            }
            TokenType::KwSuper => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::Super,
                    span: start,
                })
            }
            TokenType::LParen => self.paren_or_tuple(),
            TokenType::LBrace => self.block(),
            TokenType::KwIf => self.if_expr(),
            TokenType::KwWhile => self.while_expr(),
            TokenType::KwLet => self.declaration(),
            TokenType::KwReturn => self.return_expr(),
            TokenType::KwImport => self.import_expr(),
            TokenType::KwNew => self.new_expr(),
            TokenType::KwFn => self.lambda(),
            TokenType::Error => {
                // Surface the first collected lexer error
                let errors = self.lexer.take_errors();
                match errors.into_iter().next() {
                    Some(err) => Err(err.into()),
                    None => Err(self.unexpected("invalid token")),
                }
            }
            _ => Err(self.unexpected("expected an expression")),
        }
    }

    fn paren_or_tuple(&mut self) -> Result<Expr, ParserError> {
        let start = self.current.span;
        self.advance(); // (
        let mut parts = Vec::new();
        if !self.check(TokenType::RParen) {
            loop {
                parts.push(self.expression()?);
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenType::RParen, "')'")?;
        let span = start.merge(self.previous.span);
        if parts.len() == 1 {
            Ok(Expr {
                kind: ExprKind::Parenthesized(Box::new(parts.into_iter().next().unwrap())),
                span,
            })
        } else {
            Ok(Expr {
                kind: ExprKind::Tuple(parts),
                span,
            })
        }
    }

    fn block(&mut self) -> Result<Expr, ParserError> {
        let start = self.current.span;
        self.consume(TokenType::LBrace, "'{'")?;
        let mut elements = Vec::new();
        self.skip_semicolons();
        while !self.check(TokenType::RBrace) && !self.check(TokenType::Eof) {
            elements.push(self.element()?);
            self.skip_semicolons();
        }
        self.consume(TokenType::RBrace, "'}'")?;
        let span = start.merge(self.previous.span);
        Ok(Expr {
            kind: ExprKind::Block(elements),
            span,
        })
    }

    fn if_expr(&mut self) -> Result<Expr, ParserError> {
        let start = self.current.span;
        self.advance(); // if
        let condition = self.expression()?;
        let then_branch = self.block()?;
        let else_branch = if self.match_token(TokenType::KwElse) {
            if self.check(TokenType::KwIf) {
                Some(self.if_expr()?)
            } else {
                Some(self.block()?)
            }
        } else {
            None
        };
        let span = start.merge(self.previous.span);
        Ok(Expr {
            kind: ExprKind::If {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: else_branch.map(Box::new),
            },
            span,
        })
    }

    fn while_expr(&mut self) -> Result<Expr, ParserError> {
        let start = self.current.span;
        self.advance(); // while
        let condition = self.expression()?;
        let body = self.block()?;
        let span = start.merge(self.previous.span);
        Ok(Expr {
            kind: ExprKind::While {
                condition: Box::new(condition),
                body: Box::new(body),
            },
            span,
        })
    }

    fn declaration(&mut self) -> Result<Expr, ParserError> {
        let start = self.current.span;
        self.advance(); // let
        let pattern = self.pattern()?;
        self.consume(TokenType::Eq, "'='")?;
        let value = self.expression()?;
        let span = start.merge(self.previous.span);
        Ok(Expr {
            kind: ExprKind::Declaration {
                pattern,
                value: Box::new(value),
            },
            span,
        })
    }

    fn return_expr(&mut self) -> Result<Expr, ParserError> {
        let start = self.current.span;
        self.advance(); // return
        let value = if self.can_start_expression() {
            Some(Box::new(self.expression()?))
        } else {
            None
        };
        let span = start.merge(self.previous.span);
        Ok(Expr {
            kind: ExprKind::Return(value),
            span,
        })
    }

    fn import_expr(&mut self) -> Result<Expr, ParserError> {
        let start = self.current.span;
        self.advance(); // import
        if !self.check(TokenType::StringLiteral) {
            return Err(self.unexpected("expected a file name string"));
        }
        let file = self.current.lexeme.clone();
        self.advance();
        let span = start.merge(self.previous.span);
        Ok(Expr {
            kind: ExprKind::Import(file),
            span,
        })
    }

    fn new_expr(&mut self) -> Result<Expr, ParserError> {
        let start = self.current.span;
        self.advance(); // new
        let ty = self.type_expr()?;
        if self.check(TokenType::LBrace) {
            self.advance();
            let mut args = Vec::new();
            if !self.check(TokenType::RBrace) {
                loop {
                    args.push(self.expression()?);
                    if !self.match_token(TokenType::Comma) {
                        break;
                    }
                }
            }
            self.consume(TokenType::RBrace, "'}'")?;
            let span = start.merge(self.previous.span);
            Ok(Expr {
                kind: ExprKind::RawStructConstructor { ty, args },
                span,
            })
        } else {
            let args = self.call_args()?;
            let span = start.merge(self.previous.span);
            Ok(Expr {
                kind: ExprKind::ConstructorCall { ty, args },
                span,
            })
        }
    }

    fn lambda(&mut self) -> Result<Expr, ParserError> {
        let start = self.current.span;
        self.advance(); // fn
        self.consume(TokenType::LParen, "'('")?;
        let mut params = Vec::new();
        if !self.check(TokenType::RParen) {
            loop {
                params.push(self.pattern()?);
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenType::RParen, "')'")?;
        let return_type = if self.match_token(TokenType::Colon) {
            Some(self.type_expr()?)
        } else {
            None
        };
        let body = self.expression()?;
        let span = start.merge(self.previous.span);
        Ok(Expr {
            kind: ExprKind::Lambda {
                params,
                return_type,
                body: Box::new(body),
            },
            span,
        })
    }

    fn can_start_expression(&self) -> bool {
        matches!(
            self.current.ty,
            TokenType::IntLiteral
                | TokenType::FloatLiteral
                | TokenType::StringLiteral
                | TokenType::Identifier
                | TokenType::KwTrue
                | TokenType::KwFalse
                | TokenType::LParen
                | TokenType::LBrace
                | TokenType::KwIf
                | TokenType::KwWhile
                | TokenType::KwLet
                | TokenType::KwImport
                | TokenType::KwNew
                | TokenType::KwFn
                | TokenType::KwSuper
        )
    }

    // ------------------------------------------------------------------
    // Token plumbing
    // ------------------------------------------------------------------

    fn advance(&mut self) {
        self.previous = std::mem::replace(&mut self.current, self.lexer.next_token());
    }

    fn check(&self, ty: TokenType) -> bool {
        self.current.ty == ty
    }

    fn match_token(&mut self, ty: TokenType) -> bool {
        if self.check(ty) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, ty: TokenType, expected: &str) -> Result<(), ParserError> {
        if self.check(ty) {
            self.advance();
            Ok(())
        } else {
            Err(ParserError::ExpectedToken {
                expected: expected.to_string(),
                found: self.current.ty.as_str().to_string(),
                span: self.current.span.into(),
            })
        }
    }

    fn identifier(&mut self, what: &str) -> Result<Symbol, ParserError> {
        if self.check(TokenType::Identifier) {
            let sym = self.interner.intern(&self.current.lexeme);
            self.advance();
            Ok(sym)
        } else {
            Err(ParserError::ExpectedToken {
                expected: what.to_string(),
                found: self.current.ty.as_str().to_string(),
                span: self.current.span.into(),
            })
        }
    }

    fn skip_semicolons(&mut self) {
        while self.check(TokenType::Semicolon) {
            self.advance();
        }
    }

    fn unexpected(&self, message: &str) -> ParserError {
        ParserError::UnexpectedToken {
            found: self.current.ty.as_str().to_string(),
            span: self.current.span.into(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> File {
        let mut interner = Interner::new();
        let mut parser = Parser::new(source, &mut interner);
        parser.parse_file().expect("parse failed")
    }

    #[test]
    fn parses_class_with_generic_static_method() {
        let file = parse("class C { static fn id<T>(x: T): T x }");
        assert_eq!(file.elements.len(), 1);
        let Element::TypeDef(def) = &file.elements[0] else {
            panic!("expected type def");
        };
        let TypeDefDeclKind::Class(class) = &def.kind else {
            panic!("expected class");
        };
        assert_eq!(class.methods.len(), 1);
        let m = &class.methods[0];
        assert!(m.is_static);
        assert_eq!(m.generics.len(), 1);
        assert_eq!(m.params.len(), 1);
    }

    #[test]
    fn parses_turbofish_call() {
        let file = parse("C.id::<i32>(7)");
        let Element::Expr(expr) = &file.elements[0] else {
            panic!("expected expr");
        };
        let ExprKind::MethodCall {
            generic_args, args, ..
        } = &expr.kind
        else {
            panic!("expected method call, got {:?}", expr.kind);
        };
        assert_eq!(generic_args.len(), 1);
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn parses_raw_struct_constructor() {
        let file = parse("new Point { 1, 2 }");
        let Element::Expr(expr) = &file.elements[0] else {
            panic!("expected expr");
        };
        assert!(matches!(
            expr.kind,
            ExprKind::RawStructConstructor { ref args, .. } if args.len() == 2
        ));
    }

    #[test]
    fn super_call_is_distinguished_from_stray_super() {
        let file = parse("super.greet(1)");
        let Element::Expr(expr) = &file.elements[0] else {
            panic!("expected expr");
        };
        assert!(matches!(expr.kind, ExprKind::SuperCall { ref args, .. } if args.len() == 1));

        // Field access on `super` is rejected at parse time
        let mut interner = Interner::new();
        let mut parser = Parser::new("super.x", &mut interner);
        assert!(parser.parse_file().is_err());
    }

    #[test]
    fn parses_interleaved_block() {
        let file = parse("let x = 1 class A { } x");
        assert_eq!(file.elements.len(), 3);
        assert!(matches!(file.elements[0], Element::Expr(_)));
        assert!(matches!(file.elements[1], Element::TypeDef(_)));
        assert!(matches!(file.elements[2], Element::Expr(_)));
    }

    #[test]
    fn parses_tuple_pattern_declaration() {
        let file = parse("let (a, b): (i32, i32) = p");
        let Element::Expr(expr) = &file.elements[0] else {
            panic!("expected expr");
        };
        let ExprKind::Declaration { pattern, .. } = &expr.kind else {
            panic!("expected declaration");
        };
        assert!(matches!(pattern.kind, PatternKind::Typed(_, _)));
    }
}
