use crate::error::ParseError;
use crate::expr::*;
use crate::stmt::*;
use crate::token::{self, Token, Type};

type ParseResult<T> = Result<T, ParseError>;

/// Returns if the next token is any of the given types.
macro_rules! matches {
    ( $self:ident, $( $type:expr ),+ ) => {
        {
            if $( $self.check($type) ) ||* {
                $self.advance();
                true
            } else {
                false
            }
        }
    }
}

/// Parses a token stream into a statement list.
///
/// - program     -> declaration* EOF ;
/// - declaration -> classDecl | funDecl | varDecl | statement ;
/// - classDecl   -> "class" IDENTIFIER ( "<" IDENTIFIER )? "{" method* "}" ;
/// - method      -> "class"? IDENTIFIER "(" parameters? ")" block ;
/// - funDecl     -> "fun" function ;
/// - function    -> IDENTIFIER "(" parameters? ")" block ;
/// - varDecl     -> "var" IDENTIFIER ( "=" expression )? ";" ;
/// - statement   -> exprStmt | forStmt | ifStmt | printStmt | returnStmt
///                | whileStmt | breakStmt | block ;
/// - exprStmt    -> expression ";" ;
/// - forStmt     -> "for" "(" ( varDecl | exprStmt | ";" ) expression? ";" expression? ")" statement ;
/// - ifStmt      -> "if" "(" expression ")" statement ( "else" statement )? ;
/// - printStmt   -> "print" expression ";" ;
/// - returnStmt  -> "return" expression? ";" ;
/// - breakStmt   -> "break" ";" ;
/// - whileStmt   -> "while" "(" expression ")" statement ;
/// - block       -> "{" declaration* "}" ;
/// - expression  -> commaList ;
/// - commaList   -> assignment ( "," assignment )* ;           -- wrapped as ExprList
/// - assignment  -> ( call "." )? IDENTIFIER "=" assignment | ternary ;
/// - ternary     -> logic_or ( "?" ternary ":" ternary )? ;
/// - logic_or    -> logic_and ( "or" logic_and )* ;
/// - logic_and   -> equality ( "and" equality )* ;
/// - equality    -> comparison ( ( "!=" | "==" ) comparison )* ;
/// - comparison  -> term ( ( ">" | ">=" | "<" | "<=" ) term )* ;
/// - term        -> factor ( ( "+" | "-" ) factor )* ;
/// - factor      -> unary ( ( "*" | "/" ) unary )* ;
/// - unary       -> ( "!" | "-" ) unary | call ;
/// - call        -> primary ( "(" arguments? ")" | "." IDENTIFIER )* ;
/// - arguments   -> assignment ( "," assignment )* ;
/// - primary     -> NUMBER | STRING | "true" | "false" | "nil" | "this"
///                | IDENTIFIER | "super" "." IDENTIFIER | "(" expression ")"
///                | "fun" "(" parameters? ")" block ;
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    node_id_counter: NodeId,
    loop_depth: usize,
    errors: Vec<ParseError>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, current: 0, node_id_counter: 0, loop_depth: 0, errors: Vec::new() }
    }

    fn next_id(&mut self) -> NodeId {
        let id = self.node_id_counter;
        self.node_id_counter += 1;
        id
    }

    /// Parses the whole token stream, returning every top-level statement
    /// recovered plus any parse errors encountered along the way.
    pub fn parse(mut self) -> (Vec<Stmt>, Vec<ParseError>) {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        (statements, self.errors)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn is_at_end(&self) -> bool {
        self.peek().r#type == Type::EOF
    }

    fn check(&self, r#type: Type) -> bool {
        !self.is_at_end() && self.peek().r#type == r#type
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    /// Un-consumes the last `n` tokens. Used in exactly one place: telling
    /// apart a `fun name(...)` declaration from a `fun(...) {...}` lambda
    /// in statement position.
    fn put_back(&mut self, n: usize) {
        self.current -= n;
    }

    fn consume(&mut self, r#type: Type, message: &str) -> ParseResult<&Token> {
        if self.check(r#type) {
            return Ok(self.advance());
        }

        Err(ParseError::at(self.peek(), message))
    }

    fn declaration(&mut self) -> Option<Stmt> {
        let statement = if matches!(self, Type::Class) {
            self.class_declaration()
        } else if matches!(self, Type::Fun) {
            if self.check(Type::Identifier) {
                self.function("function", false)
            } else {
                // Not a named declaration; it's a lambda expression used as
                // a statement. Put the `fun` token back and fall through.
                self.put_back(1);
                self.statement()
            }
        } else if matches!(self, Type::Var) {
            self.var_declaration()
        } else {
            self.statement()
        };

        match statement {
            Ok(stmt) => Some(stmt),
            Err(error) => {
                self.errors.push(error);
                self.synchronize();
                None
            }
        }
    }

    fn class_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self.consume(Type::Identifier, "Expect class name")?.clone();

        let superclass = if matches!(self, Type::Less) {
            self.consume(Type::Identifier, "Expect superclass name")?;
            let id = self.next_id();
            Some(Expr::Variable(VariableData { id, name: self.previous().clone() }))
        } else {
            None
        };

        self.consume(Type::LeftBrace, "Expect '{' before class body")?;

        let mut methods = Vec::new();
        let mut static_methods = Vec::new();
        while !self.check(Type::RightBrace) && !self.is_at_end() {
            let is_static = matches!(self, Type::Class);
            let method = self.function("method", is_static)?;
            if is_static {
                static_methods.push(method);
            } else {
                methods.push(method);
            }
        }

        self.consume(Type::RightBrace, "Expect '}' after class body")?;

        Ok(Stmt::Class(ClassData { name, superclass, methods, static_methods }))
    }

    fn var_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self.consume(Type::Identifier, "Expect variable name")?.clone();

        let initializer = if matches!(self, Type::Equal) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(Type::Semicolon, "Expect ';' after variable declaration")?;
        Ok(Stmt::Var(VarData { name, initializer }))
    }

    fn statement(&mut self) -> ParseResult<Stmt> {
        if matches!(self, Type::For) {
            return self.for_statement();
        }

        if matches!(self, Type::If) {
            return self.if_statement();
        }

        if matches!(self, Type::Print) {
            return self.print_statement();
        }

        if matches!(self, Type::Return) {
            return self.return_statement();
        }

        if matches!(self, Type::Break) {
            return self.break_statement();
        }

        if matches!(self, Type::While) {
            return self.while_statement();
        }

        if matches!(self, Type::LeftBrace) {
            return Ok(Stmt::Block(BlockData { statements: self.block()? }));
        }

        self.expression_statement()
    }

    fn break_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous().clone();
        self.consume(Type::Semicolon, "Expect ';' after 'break'")?;

        if self.loop_depth == 0 {
            self.errors.push(ParseError::at(&keyword, "can't break outside of a loop"));
        }

        Ok(Stmt::Break(BreakData { keyword }))
    }

    fn for_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(Type::LeftParen, "Expect '(' after 'for'")?;

        let initializer = if matches!(self, Type::Semicolon) {
            None
        } else if matches!(self, Type::Var) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check(Type::Semicolon) { Some(self.expression()?) } else { None };
        self.consume(Type::Semicolon, "Expect ';' after loop condition")?;

        let increment = if !self.check(Type::RightParen) { Some(self.expression()?) } else { None };
        self.consume(Type::RightParen, "Expect ')' after loop clauses")?;

        self.loop_depth += 1;
        let body_result = self.statement();
        self.loop_depth -= 1;
        let mut body = body_result?;

        if let Some(increment) = increment {
            body = Stmt::Block(BlockData {
                statements: vec![body, Stmt::Expression(ExpressionData { expr: increment })],
            });
        }

        let condition = condition.unwrap_or_else(|| {
            let id = self.next_id();
            Expr::Literal(LiteralData { id, value: LiteralValue::Bool(true) })
        });

        body = Stmt::While(WhileData { condition, body: Box::new(body) });

        if let Some(initializer) = initializer {
            body = Stmt::Block(BlockData { statements: vec![initializer, body] });
        }

        Ok(body)
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(Type::LeftParen, "Expect '(' after 'if'")?;
        let condition = self.expression()?;
        self.consume(Type::RightParen, "Expect ')' after if condition")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if matches!(self, Type::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If(IfData { condition, then_branch, else_branch }))
    }

    fn print_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression()?;
        self.consume(Type::Semicolon, "Expect ';' after value")?;
        Ok(Stmt::Print(PrintData { expr }))
    }

    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous().clone();

        let value = if self.check(Type::Semicolon) { None } else { Some(self.expression()?) };

        self.consume(Type::Semicolon, "Expect ';' after return value")?;
        Ok(Stmt::Return(ReturnData { keyword, value }))
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(Type::LeftParen, "Expect '(' after 'while'")?;
        let condition = self.expression()?;
        self.consume(Type::RightParen, "Expect ')' after condition")?;

        self.loop_depth += 1;
        let body_result = self.statement();
        self.loop_depth -= 1;

        Ok(Stmt::While(WhileData { condition, body: Box::new(body_result?) }))
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression()?;
        self.consume(Type::Semicolon, "Expect ';' after expression")?;
        Ok(Stmt::Expression(ExpressionData { expr }))
    }

    /// Parses the parameter/body portion of a function or method; `kind` is
    /// only used for error messages ("function" / "method").
    fn function(&mut self, kind: &str, is_static: bool) -> ParseResult<Stmt> {
        let name = self.consume(Type::Identifier, &format!("Expect {kind} name"))?.clone();
        let params = self.parameters(kind)?;

        self.consume(Type::LeftBrace, &format!("Expect '{{' before {kind} body"))?;
        let body = self.block()?;

        Ok(Stmt::Function(FunctionData { name, params, body, is_static }))
    }

    /// Parses `"(" IDENTIFIER ( "," IDENTIFIER )* ")"`, assuming the opening
    /// paren has not yet been consumed.
    fn parameters(&mut self, kind: &str) -> ParseResult<Vec<Token>> {
        self.consume(Type::LeftParen, &format!("Expect '(' after {kind} name"))?;

        let mut params = Vec::new();
        if !self.check(Type::RightParen) {
            loop {
                if params.len() >= 255 {
                    self.errors.push(ParseError::at(self.peek(), "Cannot have more than 255 parameters"));
                }
                params.push(self.consume(Type::Identifier, "Expect parameter name")?.clone());

                if !matches!(self, Type::Comma) {
                    break;
                }
            }
        }

        self.consume(Type::RightParen, "Expect ')' after parameters")?;
        Ok(params)
    }

    fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = Vec::new();

        while !self.check(Type::RightBrace) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        self.consume(Type::RightBrace, "Expect '}' after block")?;
        Ok(statements)
    }

    fn expression(&mut self) -> ParseResult<Expr> {
        self.comma_list()
    }

    /// A statement-level expression is always wrapped in `ExprList`, even
    /// when singleton.
    fn comma_list(&mut self) -> ParseResult<Expr> {
        let id = self.next_id();
        let mut exprs = vec![self.assignment()?];

        while matches!(self, Type::Comma) {
            exprs.push(self.assignment()?);
        }

        Ok(Expr::ExprList(ExprListData { id, exprs }))
    }

    fn assignment(&mut self) -> ParseResult<Expr> {
        let expr = self.ternary()?;

        if matches!(self, Type::Equal) {
            let equals = self.previous().clone();
            let value = self.assignment()?;
            let id = self.next_id();

            return Ok(match expr {
                Expr::Variable(data) => {
                    Expr::Assign(AssignData { id, name: data.name, value: Box::new(value) })
                }
                Expr::Get(data) => Expr::Set(SetData {
                    id,
                    object: data.object,
                    name: data.name,
                    value: Box::new(value),
                }),
                other => {
                    self.errors.push(ParseError::at(&equals, "Invalid assignment target"));
                    other
                }
            });
        }

        Ok(expr)
    }

    fn ternary(&mut self) -> ParseResult<Expr> {
        let condition = self.or()?;

        if matches!(self, Type::Question) {
            let id = self.next_id();
            let then_branch = self.ternary()?;
            self.consume(Type::Colon, "Expect ':' in ternary expression")?;
            let else_branch = self.ternary()?;

            return Ok(Expr::Ternary(TernaryData {
                id,
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            }));
        }

        Ok(condition)
    }

    /// `and`/`or` fold into `Binary` — this implementation evaluates both
    /// operands eagerly rather than short-circuiting (see DESIGN.md).
    fn or(&mut self) -> ParseResult<Expr> {
        let mut expr = self.and()?;

        while matches!(self, Type::Or) {
            let operator = self.previous().clone();
            let right = self.and()?;
            let id = self.next_id();
            expr = Expr::Binary(BinaryData { id, left: Box::new(expr), operator, right: Box::new(right) });
        }

        Ok(expr)
    }

    fn and(&mut self) -> ParseResult<Expr> {
        let mut expr = self.equality()?;

        while matches!(self, Type::And) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            let id = self.next_id();
            expr = Expr::Binary(BinaryData { id, left: Box::new(expr), operator, right: Box::new(right) });
        }

        Ok(expr)
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        let mut expr = self.comparison()?;

        while matches!(self, Type::BangEqual, Type::EqualEqual) {
            let operator = self.previous().clone();
            let right = self.comparison()?;
            let id = self.next_id();
            expr = Expr::Binary(BinaryData { id, left: Box::new(expr), operator, right: Box::new(right) });
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let mut expr = self.term()?;

        while matches!(self, Type::Greater, Type::GreaterEqual, Type::Less, Type::LessEqual) {
            let operator = self.previous().clone();
            let right = self.term()?;
            let id = self.next_id();
            expr = Expr::Binary(BinaryData { id, left: Box::new(expr), operator, right: Box::new(right) });
        }

        Ok(expr)
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let mut expr = self.factor()?;

        while matches!(self, Type::Minus, Type::Plus) {
            let operator = self.previous().clone();
            let right = self.factor()?;
            let id = self.next_id();
            expr = Expr::Binary(BinaryData { id, left: Box::new(expr), operator, right: Box::new(right) });
        }

        Ok(expr)
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        let mut expr = self.unary()?;

        while matches!(self, Type::Slash, Type::Star) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            let id = self.next_id();
            expr = Expr::Binary(BinaryData { id, left: Box::new(expr), operator, right: Box::new(right) });
        }

        Ok(expr)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if matches!(self, Type::Bang, Type::Minus) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            let id = self.next_id();
            return Ok(Expr::Unary(UnaryData { id, operator, expr: Box::new(right) }));
        }

        self.call()
    }

    fn finish_call(&mut self, callee: Expr) -> ParseResult<Expr> {
        let mut arguments = Vec::new();

        if !self.check(Type::RightParen) {
            loop {
                if arguments.len() >= 255 {
                    self.errors.push(ParseError::at(self.peek(), "Cannot have more than 255 arguments"));
                }
                arguments.push(self.assignment()?);

                if !matches!(self, Type::Comma) {
                    break;
                }
            }
        }

        let paren = self.consume(Type::RightParen, "Expect ')' after arguments")?.clone();
        let id = self.next_id();

        Ok(Expr::Call(CallData { id, callee: Box::new(callee), paren, arguments }))
    }

    fn call(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;

        loop {
            if matches!(self, Type::LeftParen) {
                expr = self.finish_call(expr)?;
            } else if matches!(self, Type::Dot) {
                let name = self.consume(Type::Identifier, "Expected property name after '.'")?.clone();
                let id = self.next_id();
                expr = Expr::Get(GetData { id, object: Box::new(expr), name });
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        if matches!(self, Type::False) {
            let id = self.next_id();
            return Ok(Expr::Literal(LiteralData { id, value: LiteralValue::Bool(false) }));
        }

        if matches!(self, Type::True) {
            let id = self.next_id();
            return Ok(Expr::Literal(LiteralData { id, value: LiteralValue::Bool(true) }));
        }

        if matches!(self, Type::Nil) {
            let id = self.next_id();
            return Ok(Expr::Literal(LiteralData { id, value: LiteralValue::Nil }));
        }

        if matches!(self, Type::Number, Type::String) {
            let literal = self.previous().clone().literal.expect("number/string token carries a literal");
            let value = match literal {
                token::Literal::Number(n) => LiteralValue::Number(n),
                token::Literal::String(s) => LiteralValue::String(s),
            };
            let id = self.next_id();
            return Ok(Expr::Literal(LiteralData { id, value }));
        }

        if matches!(self, Type::Super) {
            let keyword = self.previous().clone();
            self.consume(Type::Dot, "Expect '.' after 'super'")?;
            let method = self.consume(Type::Identifier, "Expect superclass method name")?.clone();
            let id = self.next_id();
            return Ok(Expr::Super(SuperData { id, keyword, method }));
        }

        if matches!(self, Type::This) {
            let id = self.next_id();
            return Ok(Expr::This(ThisData { id, keyword: self.previous().clone() }));
        }

        if matches!(self, Type::Identifier) {
            let id = self.next_id();
            return Ok(Expr::Variable(VariableData { id, name: self.previous().clone() }));
        }

        if matches!(self, Type::LeftParen) {
            let expr = self.expression()?;
            self.consume(Type::RightParen, "Expected ')' after expression")?;
            let id = self.next_id();
            return Ok(Expr::Grouping(GroupingData { id, expr: Box::new(expr) }));
        }

        if matches!(self, Type::Fun) {
            let keyword = self.previous().clone();
            let params = self.parameters("lambda")?;
            self.consume(Type::LeftBrace, "Expect '{' before lambda body")?;
            let body = self.block()?;
            let id = self.next_id();
            return Ok(Expr::Lambda(LambdaData { id, keyword, params, body }));
        }

        Err(ParseError::at(self.peek(), "Expected expression"))
    }

    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().r#type == Type::Semicolon {
                return;
            }

            match self.peek().r#type {
                Type::Class | Type::Fun | Type::Var | Type::For | Type::If | Type::While
                | Type::Print | Type::Return => return,
                _ => {
                    self.advance();
                }
            };
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scanner::Scanner;

    fn parse(source: &str) -> (Vec<Stmt>, Vec<ParseError>) {
        let (tokens, scan_errors) = Scanner::new(source).scan_tokens();
        assert!(scan_errors.is_empty());
        Parser::new(tokens).parse()
    }

    #[test]
    fn wraps_expression_statement_in_expr_list() {
        let (statements, errors) = parse("1, 2, 3;");
        assert!(errors.is_empty());
        let Stmt::Expression(data) = &statements[0] else { unreachable!() };
        let Expr::ExprList(list) = &data.expr else { unreachable!() };
        assert_eq!(list.exprs.len(), 3);
    }

    #[test]
    fn ternary_is_right_associative() {
        let (statements, errors) = parse("a ? b : c ? d : e;");
        assert!(errors.is_empty());
        let Stmt::Expression(data) = &statements[0] else { unreachable!() };
        let Expr::ExprList(list) = &data.expr else { unreachable!() };
        let Expr::Ternary(outer) = &list.exprs[0] else { unreachable!() };
        assert!(matches!(*outer.else_branch, Expr::Ternary(_)));
    }

    #[test]
    fn and_or_fold_into_binary() {
        let (statements, errors) = parse("a and b or c;");
        assert!(errors.is_empty());
        let Stmt::Expression(data) = &statements[0] else { unreachable!() };
        let Expr::ExprList(list) = &data.expr else { unreachable!() };
        assert!(matches!(&list.exprs[0], Expr::Binary(b) if b.operator.r#type == Type::Or));
    }

    #[test]
    fn for_loop_desugars_to_block_with_while() {
        let (statements, errors) = parse("for (var i = 0; i < 1; i = i + 1) print i;");
        assert!(errors.is_empty());
        let Stmt::Block(block) = &statements[0] else { unreachable!() };
        assert_eq!(block.statements.len(), 2);
        assert!(matches!(block.statements[0], Stmt::Var(_)));
        assert!(matches!(block.statements[1], Stmt::While(_)));
    }

    #[test]
    fn bare_fun_call_in_statement_position_parses_as_lambda() {
        let (statements, errors) = parse("fun(x) { return x; }(1);");
        assert!(errors.is_empty());
        let Stmt::Expression(data) = &statements[0] else { unreachable!() };
        let Expr::ExprList(list) = &data.expr else { unreachable!() };
        let Expr::Call(call) = &list.exprs[0] else { unreachable!() };
        assert!(matches!(*call.callee, Expr::Lambda(_)));
    }

    #[test]
    fn break_outside_loop_is_reported_but_recovered() {
        let (statements, errors) = parse("break;");
        assert_eq!(statements.len(), 1);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("break"));
    }

    #[test]
    fn invalid_assignment_target_reports_error() {
        let (_, errors) = parse("1 = 2;");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Invalid assignment target"));
    }

    #[test]
    fn static_method_is_collected_separately() {
        let (statements, errors) = parse("class C { class make() { return 1; } count() { return 2; } }");
        assert!(errors.is_empty());
        let Stmt::Class(data) = &statements[0] else { unreachable!() };
        assert_eq!(data.static_methods.len(), 1);
        assert_eq!(data.methods.len(), 1);
    }
}
