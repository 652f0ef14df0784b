use nom::{
    branch::alt,
    bytes::complete::tag_no_case,
    character::complete::{char, digit1, multispace0, multispace1},
    combinator::{map_res, opt},
    multi::separated_list1,
    sequence::{delimited, preceded, tuple},
    IResult,
};

#[derive(Debug, PartialEq, Clone)]
pub enum Command {
    Reduce { workers: usize },
    Sweep { workers: Option<Vec<usize>> },
    /// Hours are 1-based, as shown to users.
    Score { hour: usize },
    Record { hour: usize },
    Count,
    Help,
    Exit,
}

// --- BASIC PARSERS ---

fn parse_usize(input: &str) -> IResult<&str, usize> {
    map_res(digit1, |s: &str| s.parse::<usize>())(input)
}

fn parse_usize_list(input: &str) -> IResult<&str, Vec<usize>> {
    let list = || separated_list1(tuple((multispace0, char(','), multispace0)), parse_usize);
    alt((delimited(ws(char('[')), list(), ws(char(']'))), list()))(input)
}

// --- HELPERS ---
pub(crate) fn ws<'a, F, O, E: nom::error::ParseError<&'a str>>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O, E>
where F: FnMut(&'a str) -> IResult<&'a str, O, E> {
    delimited(multispace0, inner, multispace0)
}

fn tag_ci(t: &'static str) -> impl FnMut(&str) -> IResult<&str, &str> {
    move |input| tag_no_case(t)(input)
}

// --- COMMAND PARSERS ---

fn parse_reduce(input: &str) -> IResult<&str, Command> {
    let (input, _) = alt((tag_ci("REDUCE"), tag_ci("RUN")))(input)?;
    let (input, _) = opt(ws(tag_ci("WITH")))(input)?;
    let (input, workers) = ws(parse_usize)(input)?;
    let (input, _) = opt(ws(alt((tag_ci("WORKERS"), tag_ci("THREADS")))))(input)?;
    Ok((input, Command::Reduce { workers }))
}

fn parse_sweep(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("SWEEP")(input)?;
    let (input, workers) = opt(preceded(multispace1, parse_usize_list))(input)?;
    Ok((input, Command::Sweep { workers }))
}

fn parse_hour_arg(input: &str) -> IResult<&str, usize> {
    let (input, _) = multispace1(input)?;
    let (input, _) = opt(tuple((tag_ci("HOUR"), multispace1)))(input)?;
    parse_usize(input)
}

fn parse_score(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("SCORE")(input)?;
    let (input, hour) = parse_hour_arg(input)?;
    Ok((input, Command::Score { hour }))
}

fn parse_record(input: &str) -> IResult<&str, Command> {
    let (input, _) = alt((tag_ci("RECORD"), tag_ci("SHOW")))(input)?;
    let (input, hour) = parse_hour_arg(input)?;
    Ok((input, Command::Record { hour }))
}

fn parse_count(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("COUNT")(input)?;
    Ok((input, Command::Count))
}

fn parse_help(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("HELP")(input)?;
    Ok((input, Command::Help))
}

fn parse_exit(input: &str) -> IResult<&str, Command> {
    let (input, _) = alt((tag_ci("EXIT"), tag_ci("QUIT")))(input)?;
    Ok((input, Command::Exit))
}

pub fn parse_command(input: &str) -> Result<Command, String> {
    let input = input.trim();
    let result = alt((
        parse_reduce,
        parse_sweep,
        parse_score,
        parse_record,
        parse_count,
        parse_help,
        parse_exit,
    ))(input);

    match result {
        Ok((remainder, cmd)) => {
            if !remainder.trim().is_empty() {
                return Err(format!("Unexpected tokens at end: '{}'", remainder));
            }
            Ok(cmd)
        },
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let context = if e.input.chars().count() > 20 {
                format!("{}...", e.input.chars().take(20).collect::<String>())
            } else {
                e.input.to_string()
            };
            Err(format!("Invalid syntax near: '{}'", context))
        },
        Err(nom::Err::Incomplete(_)) => Err("Incomplete command.".to_string()),
    }
}
