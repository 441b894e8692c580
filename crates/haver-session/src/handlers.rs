//! Command handlers, one function per registered command.
//!
//! Every handler gets its arguments already arity-checked, runs under the
//! directory lock, and returns the phase to move to (if any). Failures are
//! raised as [`Fail`] through `?`.

use haver_directory::{Directory, DirectoryError, Entity, Namespace, Room, User};
use haver_protocol::{Fail, Line};

use crate::SessionError;
use crate::phase::Phase;
use crate::session::{Context, Session};

type Outcome = Result<Option<Phase>, SessionError>;

fn owner_check(directory: &Directory, room: &str, me: &str) -> Result<(), SessionError> {
    let room = directory.lookup::<Room>(room)?;
    if room.is_owner(me) {
        Ok(())
    } else {
        Err(Fail::new("access.owner")
            .arg(room.name())
            .arg(room.owner())
            .arg(me)
            .into())
    }
}

fn touch(directory: &Directory, me: &str) -> Result<(), SessionError> {
    directory.lookup::<User>(me)?.update_idle();
    Ok(())
}

// ---------------------------------------------------------------------------
// Connect / login
// ---------------------------------------------------------------------------

/// `HAVER version [supports] ...`
pub(crate) fn haver(session: &mut Session, ctx: &mut Context<'_>, args: &[String]) -> Outcome {
    let supports = args
        .get(1)
        .map(|s| {
            s.split(',')
                .filter(|e| !e.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    session.record_handshake(&args[0], supports);

    session.reply(
        Line::new("HAVER")
            .arg(&ctx.config.hostname)
            .arg(&ctx.config.version)
            .arg(ctx.registry.extensions().join(",")),
    );
    Ok(Some(Phase::Login))
}

/// Creates and registers a user bound to this connection, then greets it.
fn register(session: &mut Session, directory: &mut Directory, name: &str) -> Result<(), DirectoryError> {
    let version = session.client_version().unwrap_or_default().to_string();
    let user = User::new(
        name,
        session.peer().ip(),
        session.is_secure(),
        &version,
        session.link(),
    )?;
    let name = directory.add(user)?.name().to_string();
    tracing::info!(conn = %session.id(), user = %name, peer = %session.peer(), "logged in");

    session.set_user(&name);
    session.reply(Line::new("HELLO").arg(&name).arg(session.peer().ip().to_string()));
    Ok(())
}

/// `IDENT name`
pub(crate) fn ident(session: &mut Session, ctx: &mut Context<'_>, args: &[String]) -> Outcome {
    register(session, ctx.directory, &args[0])?;
    Ok(Some(Phase::Normal))
}

/// `GHOST name`: take over a name held by another connection from the
/// same address.
pub(crate) fn ghost(session: &mut Session, ctx: &mut Context<'_>, args: &[String]) -> Outcome {
    let name = &args[0];
    match register(session, ctx.directory, name) {
        Err(DirectoryError::ExistingEntity(..)) => {}
        other => {
            other?;
            return Ok(Some(Phase::Normal));
        }
    }

    let (held_name, old_link) = {
        let held = ctx.directory.lookup::<User>(name)?;
        if held.address() != session.peer().ip() {
            return Err(Fail::new("mismatch.ip")
                .arg(held.name())
                .arg(held.address().to_string())
                .arg(session.peer().ip().to_string())
                .into());
        }
        (held.name().to_string(), held.link().cloned())
    };

    tracing::info!(conn = %session.id(), user = %held_name, "ghosting");
    ctx.directory.quit(&held_name, "ghost", None)?;
    if let Some(link) = old_link {
        link.send(Line::new("BYE").arg("ghost"));
        link.close();
    }

    register(session, ctx.directory, name)?;
    Ok(Some(Phase::Normal))
}

/// `SPOON:ATTACH name key`: resume a detached user.
pub(crate) fn spoon_attach(
    session: &mut Session,
    ctx: &mut Context<'_>,
    args: &[String],
) -> Outcome {
    let (name, key) = (&args[0], &args[1]);

    let user = ctx.directory.lookup::<User>(name)?;
    if user.is_attached() {
        return Err(Fail::new("already.attached").arg(user.name()).into());
    }
    if !user.detach_key_matches(key) {
        return Err(Fail::new("mismatch.key").arg(user.name()).into());
    }
    let name = user.name().to_string();
    let address = session.peer().ip();
    let spooled = ctx
        .directory
        .reattach(&name, session.link(), address, session.is_secure())?;
    tracing::info!(conn = %session.id(), user = %name, replayed = spooled.len(), "reattached");

    session.set_user(&name);
    session.reply(Line::new("HELLO").arg(&name).arg(address.to_string()));
    let count = spooled.len();
    for entry in spooled {
        session.reply(
            Line::new("SPOON:LOG")
                .arg(entry.at.to_rfc3339())
                .arg(entry.line.command)
                .args(entry.line.args),
        );
    }
    session.reply(Line::new("SPOON:END").arg(count.to_string()));

    // A plaintext connection can't stay in rooms secured while detached
    // or joined from an encrypted one.
    if !session.is_secure() {
        let left = ctx.directory.evict_from_secure_rooms(&name)?;
        if !left.is_empty() {
            tracing::info!(user = %name, rooms = ?left, "left secure rooms on insecure attach");
        }
    }
    Ok(Some(Phase::Normal))
}

// ---------------------------------------------------------------------------
// Normal
// ---------------------------------------------------------------------------

/// `SPOON:DETACH key`: keep the user registered without a connection.
pub(crate) fn spoon_detach(
    session: &mut Session,
    ctx: &mut Context<'_>,
    args: &[String],
) -> Outcome {
    let me = session.me()?.to_string();
    session.reply(Line::new("SPOON:DETACH").arg(&me));
    ctx.directory.lookup_mut::<User>(&me)?.detach(&args[0]);
    session.close_transport();
    tracing::info!(conn = %session.id(), user = %me, "detached");
    Ok(Some(Phase::Spoon))
}

/// `TO user kind msg [extra...]`
pub(crate) fn to(session: &mut Session, ctx: &mut Context<'_>, args: &[String]) -> Outcome {
    let me = session.me()?;
    touch(ctx.directory, me)?;
    let line = Line::new("FROM").arg(me).args(&args[1..]);
    ctx.directory.send_to(&args[0], line)?;
    Ok(None)
}

/// `IN room kind msg [extra...]`
pub(crate) fn in_room(session: &mut Session, ctx: &mut Context<'_>, args: &[String]) -> Outcome {
    let me = session.me()?;
    touch(ctx.directory, me)?;
    let room = ctx.directory.lookup::<Room>(&args[0])?.name().to_string();
    let line = Line::new("IN").arg(&room).arg(me).args(&args[1..]);
    ctx.directory.broadcast(&room, &line)?;
    Ok(None)
}

/// `JOIN room`
pub(crate) fn join(session: &mut Session, ctx: &mut Context<'_>, args: &[String]) -> Outcome {
    let me = session.me()?;
    let room = ctx.directory.lookup::<Room>(&args[0])?;
    if room.is_secure() && !session.is_secure() {
        return Err(Fail::new("insecure").arg(room.name()).into());
    }
    ctx.directory.join(&args[0], me)?;
    Ok(None)
}

/// `PART room`
pub(crate) fn part(session: &mut Session, ctx: &mut Context<'_>, args: &[String]) -> Outcome {
    let me = session.me()?;
    ctx.directory.part(&args[0], me, "normal", None)?;
    Ok(None)
}

/// `OPEN room`
pub(crate) fn open(session: &mut Session, ctx: &mut Context<'_>, args: &[String]) -> Outcome {
    let me = session.me()?;
    let room = Room::new(&args[0], me)?;
    let name = ctx.directory.add(room)?.name().to_string();
    tracing::info!(room = %name, owner = %me, "room opened");
    session.reply(Line::new("OPEN").arg(name));
    Ok(None)
}

/// `CLOSE room`
pub(crate) fn close(session: &mut Session, ctx: &mut Context<'_>, args: &[String]) -> Outcome {
    let me = session.me()?;
    owner_check(ctx.directory, &args[0], me)?;
    let room = ctx.directory.close_room(&args[0], me)?;
    session.reply(Line::new("CLOSE").arg(room.name()));
    Ok(None)
}

/// `KICK room user`
pub(crate) fn kick(session: &mut Session, ctx: &mut Context<'_>, args: &[String]) -> Outcome {
    let me = session.me()?;
    owner_check(ctx.directory, &args[0], me)?;
    ctx.directory.part(&args[0], &args[1], "kick", Some(me))?;
    Ok(None)
}

/// `SECURE room`: evict insecure members and bar new ones.
pub(crate) fn secure(session: &mut Session, ctx: &mut Context<'_>, args: &[String]) -> Outcome {
    let me = session.me()?;
    owner_check(ctx.directory, &args[0], me)?;
    let evicted = ctx.directory.secure_room(&args[0])?;

    let room = ctx.directory.lookup::<Room>(&args[0])?;
    let name = room.name().to_string();
    let caller_is_member = room.is_member(me);
    tracing::info!(room = %name, evicted = evicted.len(), "room secured");

    let line = Line::new("SECURE").arg(&name).args(evicted);
    if !caller_is_member {
        session.reply(line.clone());
    }
    ctx.directory.broadcast(&name, &line)?;
    Ok(None)
}

/// `BYE [detail]`
pub(crate) fn bye(session: &mut Session, ctx: &mut Context<'_>, args: &[String]) -> Outcome {
    session.quit_user(ctx.directory, "bye", args.first().map(String::as_str));
    session.reply(Line::new("BYE").arg("bye"));
    session.close_transport();
    Ok(Some(Phase::Quit))
}

/// `PONG token`
pub(crate) fn pong(session: &mut Session, _ctx: &mut Context<'_>, _args: &[String]) -> Outcome {
    match session.take_ping() {
        Some(_) => Ok(None),
        None => Err(SessionError::bork("unexpected PONG")),
    }
}

/// `POKE token`
pub(crate) fn poke(session: &mut Session, _ctx: &mut Context<'_>, args: &[String]) -> Outcome {
    session.reply(Line::new("OUCH").arg(&args[0]));
    Ok(None)
}

/// `INFO namespace name`
pub(crate) fn info(session: &mut Session, ctx: &mut Context<'_>, args: &[String]) -> Outcome {
    let ns: Namespace = args[0].parse()?;
    let name = match ns {
        Namespace::User => ctx.directory.lookup::<User>(&args[1])?.name().to_string(),
        Namespace::Room => ctx.directory.lookup::<Room>(&args[1])?.name().to_string(),
    };
    let attributes = ctx.directory.attributes(ns, &name)?;
    session.reply(
        Line::new("INFO")
            .arg(ns.as_str())
            .arg(name)
            .args(attributes.into_iter().flat_map(|(k, v)| [k, v])),
    );
    Ok(None)
}

/// `LIST namespace`
pub(crate) fn list(session: &mut Session, ctx: &mut Context<'_>, args: &[String]) -> Outcome {
    let ns: Namespace = args[0].parse()?;
    session.reply(Line::new("LIST").arg(ns.as_str()).args(ctx.directory.names(ns)));
    Ok(None)
}

/// `USERS room`
pub(crate) fn users(session: &mut Session, ctx: &mut Context<'_>, args: &[String]) -> Outcome {
    let room = ctx.directory.lookup::<Room>(&args[0])?;
    session.reply(Line::new("USERS").arg(room.name()).args(room.members()));
    Ok(None)
}
